use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// String encodings available to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Escapes HTML special characters.
    #[default]
    Html,
    /// Transliterates to plain ASCII.
    Ascii,
    Base64,
    /// Base64 wrapped in a script that writes the decoded text into the page.
    Base64Script,
    /// Percent-encodes for use in a URL.
    Url,
}

impl Encoding {
    pub fn apply(self, text: &str) -> String {
        match self {
            Encoding::Html => minijinja::HtmlEscape(text).to_string(),
            Encoding::Ascii => deunicode::deunicode(text),
            Encoding::Base64 => STANDARD.encode(text),
            Encoding::Base64Script => format!(
                "<script type='application/javascript'>document.write(atob('{}'));</script>",
                STANDARD.encode(text)
            ),
            Encoding::Url => urlencoding::encode(text).into_owned(),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Encoding::Html),
            "ascii" => Ok(Encoding::Ascii),
            "base64" => Ok(Encoding::Base64),
            "base64_script" | "base64-script" | "base64_js" => Ok(Encoding::Base64Script),
            "url" => Ok(Encoding::Url),
            other => Err(format!("unknown encoding `{}`", other)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Html => "html",
            Encoding::Ascii => "ascii",
            Encoding::Base64 => "base64",
            Encoding::Base64Script => "base64_script",
            Encoding::Url => "url",
        };
        f.write_str(name)
    }
}
