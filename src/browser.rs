/// Shows the authorization URL to the user. Failing to launch a browser is
/// never fatal; the URL is printed instead.
pub fn present_authorization_url(url: &str, no_open: bool) {
    if no_open {
        eprintln!("Open the following URL in your browser:\n\n{url}\n");
    } else {
        eprintln!("Opening browser for authentication...");
        if let Err(err) = webbrowser::open(url) {
            tracing::warn!(error = %err, "failed to open browser automatically");
            eprintln!(
                "Could not open browser automatically.\nOpen the following URL in your browser:\n\n{url}\n"
            );
        }
    }
    eprintln!("Waiting for authentication...");
}
