//! Headless kiosk front-end: renders the session as text and maps typed
//! commands to user actions.

use std::future::Future;
use std::io::Write;

use eyre::Result;
use gridapp_core::{ConnectionStatus, MountedSession, SessionView, Topic};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

pub const INITIALIZING: &str = "Initializing App...";
pub const LOADING: &str = "Loading gridapp settings...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AddToCart,
    Show,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "add" => Some(Self::AddToCart),
            "show" => Some(Self::Show),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Text for the current view. While connecting the app shell is still
/// initializing; without settings it shows the loading affordance.
pub fn render(view: &SessionView, cart_count: u32) -> String {
    match &view.settings {
        None if matches!(
            view.status,
            ConnectionStatus::Uninitialized | ConnectionStatus::Connecting
        ) =>
        {
            INITIALIZING.to_string()
        }
        None => LOADING.to_string(),
        Some(settings) => format!(
            "Product name: {}\nProduct price: {}\nIn cart: {}",
            settings.product_name, settings.product_price, cart_count
        ),
    }
}

struct Screen<'a, W> {
    out: &'a mut W,
    last: Option<String>,
}

impl<W: Write> Screen<'_, W> {
    fn draw(&mut self, session: &MountedSession, force: bool) -> Result<()> {
        let frame = render(&session.current(), session.cart_count());
        if force || self.last.as_deref() != Some(frame.as_str()) {
            writeln!(self.out, "{frame}")?;
            self.out.flush()?;
            self.last = Some(frame);
        }
        Ok(())
    }
}

/// Runs the kiosk until `quit`, end of input, or `shutdown` resolves, then
/// unmounts the session.
pub async fn run<R, W, F>(session: MountedSession, input: R, out: &mut W, shutdown: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    F: Future<Output = ()>,
{
    let mut view_rx = session.view();
    let mut cart_rx = session.watch_topic(&Topic::cart());
    let mut lines = input.lines();
    let mut screen = Screen { out, last: None };
    tokio::pin!(shutdown);

    screen.draw(&session, false)?;

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => break,

            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                screen.draw(&session, false)?;
            }

            changed = cart_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                screen.draw(&session, false)?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Command::parse(&line) {
                    Some(Command::AddToCart) => session.add_to_cart(1),
                    Some(Command::Show) => screen.draw(&session, true)?,
                    Some(Command::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => writeln!(screen.out, "Unknown command: {}", line.trim())?,
                }
            }
        }
    }

    debug!(target: "gridapp::kiosk", "Kiosk stopped, unmounting session");
    session.unmount();
    Ok(())
}
