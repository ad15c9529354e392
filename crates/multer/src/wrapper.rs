/// Wraps a handler into another one.
///
/// [`crate::Multer`] is a wrapper: it turns the next handler into a [`crate::MulterHandler`]
/// that parses the multipart body first.
pub trait Wrapper<H> {
    /// the wrapped handler
    type Out;

    fn wrap(&self, handler: H) -> Self::Out;
}
