//! Vellum - compiled template catalogs and phased render dispatch.
//!
//! This crate re-exports everything from [`vellum_render`] and adds the
//! `vellum` command-line tool ([`cli`]) for inspecting catalogs, running
//! queries and rendering templates.
//!
//! ```rust
//! use vellum::{CatalogBuilder, Payload, Render, RenderInfo, TemplateLookup};
//!
//! let mut builder = CatalogBuilder::new();
//! builder.add("hello.tmp", &Payload::new("text").with_name("Hello").with_body("hi"));
//!
//! let render = Render::new(TemplateLookup::new(builder.build().unwrap()));
//! let mut info = RenderInfo::new("Hello");
//! render.render(&mut info).unwrap();
//! assert_eq!(info.output(), "hi");
//! ```

pub mod cli;

pub use vellum_render::*;
