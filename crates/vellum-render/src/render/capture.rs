use super::hooks::RenderHooks;

/// Adds output capture to `hooks`.
///
/// The pre-render hook opens a capture buffer, so everything the cycle writes
/// is buffered instead of streamed. The post-render hook moves the buffer into
/// the [`Response`](super::Response) body. When the cycle fails the
/// post-render hook does not run and the partial output stays visible through
/// [`RenderInfo::captured`](super::RenderInfo::captured).
///
/// # Example
///
/// ```rust
/// use vellum_render::{capture_output, RenderHooks};
///
/// let hooks = capture_output(RenderHooks::new());
/// assert!(!hooks.is_empty());
/// ```
pub fn capture_output(hooks: RenderHooks) -> RenderHooks {
    hooks
        .pre_render(|info| {
            info.start_capture();
            Ok(())
        })
        .post_render(|info| {
            if let Some(body) = info.finish_capture() {
                tracing::debug!(bytes = body.len(), "captured response body");
                info.response_mut().set_body(body);
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderInfo;

    #[test]
    fn test_capture_moves_output_into_response() {
        let hooks = capture_output(RenderHooks::new());
        let mut info = RenderInfo::new("x");

        hooks.run_pre_render(&mut info).unwrap();
        info.write("hello");
        assert_eq!(info.output(), "");
        hooks.run_post_render(&mut info).unwrap();

        assert_eq!(info.response().body(), "hello");
        assert!(!info.is_capturing());
    }
}
