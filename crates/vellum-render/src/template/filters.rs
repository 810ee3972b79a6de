//! MiniJinja filter registration.

use minijinja::{Environment, Error, ErrorKind, Value};

use crate::render::Encoding;

/// Registers the built-in filters on a MiniJinja environment.
///
/// - `nl` appends a newline: `{{ "" | nl }}` outputs a blank line.
/// - `encode(mode)` applies an [`Encoding`] by name (`html`, `ascii`,
///   `base64`, `base64_script` or `url`; defaults to `html`).
pub fn register_filters(env: &mut Environment<'static>) {
    env.add_filter("nl", |value: Value| -> String { format!("{}\n", value) });

    env.add_filter(
        "encode",
        |value: Value, mode: Option<String>| -> Result<String, Error> {
            let mode = mode.as_deref().unwrap_or("html");
            let encoding: Encoding = mode.parse().map_err(|_| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("unknown encoding `{}`", mode),
                )
            })?;
            let text = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            Ok(encoding.apply(&text))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str, value: &str) -> Result<String, Error> {
        let mut env = Environment::new();
        register_filters(&mut env);
        env.render_str(source, minijinja::context! { value => value })
    }

    #[test]
    fn test_nl_filter() {
        assert_eq!(render("{{ value | nl }}", "a").unwrap(), "a\n");
    }

    #[test]
    fn test_encode_filter_modes() {
        assert_eq!(
            render("{{ value | encode('url') }}", "a b&c").unwrap(),
            "a%20b%26c"
        );
        assert_eq!(render("{{ value | encode('base64') }}", "hi").unwrap(), "aGk=");
        assert_eq!(render("{{ value | encode('ascii') }}", "Ærøskøbing").unwrap(), "AEroskobing");
    }

    #[test]
    fn test_encode_filter_unknown_mode() {
        let err = render("{{ value | encode('rot13') }}", "a").unwrap_err();
        assert!(err.to_string().contains("unknown encoding"));
    }
}
