use anyhow::Result;

/// The two capabilities the capture loop needs from a remote view:
/// grab the current page as raw image bytes, and move one page
/// forward. Every `capture` call must return a buffer of the same clip
/// dimensions, since frame equality is plain byte comparison.
pub trait PageSource {
    fn capture(&self) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    fn advance(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
