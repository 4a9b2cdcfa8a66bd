//! mdpaste - Markdown paste menubar app
//!
//! Lives in the macOS menu bar; turns Markdown on the clipboard into rich text.

#[cfg(target_os = "macos")]
fn main() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mdpaste=info")),
        )
        .init();

    if let Err(e) = mdpaste::menubar::app::MenubarApp::run() {
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "macos"))]
fn main() {
    eprintln!("mdpaste is only supported on macOS");
    std::process::exit(1);
}
