//! Transcript rendering for the terminal.
//!
//! Rendering is pure display mapping: the store decides what the transcript
//! contains, the renderer only decides how it looks. [`attach`] wires a
//! renderer to a store so that every appended message is drawn and the view is
//! pinned to the newest message.
//!
//! Write failures surface as [`Error::Io`](crate::Error::Io). Inside [`attach`]
//! there is no caller to hand them to, so they are logged and the store carries
//! on.

use std::cell::RefCell;
use std::io::{self, Stdout, Write};
use std::rc::Rc;

use crate::chat::{ConversationStore, StoreEvent, SubscriptionId};
use crate::client::ChatTransport;
use crate::error::Result;
use crate::types::{Message, MessageKind, Sender};

/// ANSI escape code for dim text (used for the pending indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for blue text (used for user labels and download links).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Return to column zero and erase the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// OSC 8 hyperlink opener; the URL goes between this and [`OSC8_CLOSE`].
const OSC8_OPEN: &str = "\x1b]8;;";

/// OSC 8 terminator.
const OSC8_CLOSE: &str = "\x1b\\";

const PENDING_TEXT: &str = "Chatbot is thinking...";
const DOWNLOAD_LABEL: &str = "Download Paper";

/// Trait for rendering the conversation transcript.
pub trait TranscriptRenderer {
    /// Draw one transcript entry.
    fn render_message(&mut self, message: &Message) -> Result<()>;

    /// Show or hide the transient "thinking" indicator.
    fn show_pending(&mut self, pending: bool) -> Result<()>;

    /// Pin the view to the newest message.
    ///
    /// Called after every history append.
    fn scroll_to_latest(&mut self) -> Result<()>;

    /// Print an error message.
    fn print_error(&mut self, error: &str) -> Result<()>;

    /// Print an informational message.
    fn print_info(&mut self, info: &str) -> Result<()>;

    /// Draw a whole transcript, oldest first.
    fn render_history(&mut self, history: &[Message]) -> Result<()> {
        for message in history {
            self.render_message(message)?;
        }
        self.scroll_to_latest()
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Document links become an OSC 8 hyperlink labelled "Download Paper", which
/// most terminals make clickable; the URL is printed beside it for the rest.
pub struct PlainTextRenderer<W: Write = Stdout> {
    out: W,
    use_color: bool,
    echo_user: bool,
    pending_shown: bool,
    rendered: usize,
    scrolled_to: usize,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            echo_user: false,
            pending_shown: false,
            rendered: 0,
            scrolled_to: 0,
        }
    }

    /// Whether user messages are drawn too.
    ///
    /// Off by default: at an interactive prompt the line editor already shows
    /// what was typed.
    pub fn with_user_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Number of messages drawn so far.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Number of messages the view was last scrolled past.
    pub fn scrolled_to(&self) -> usize {
        self.scrolled_to
    }

    /// Flushes to ensure immediate display.
    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn clear_pending(&mut self) -> Result<()> {
        if self.pending_shown {
            self.pending_shown = false;
            if self.use_color {
                write!(self.out, "{ANSI_CLEAR_LINE}")?;
            }
        }
        Ok(())
    }

    fn label(&self, sender: Sender) -> String {
        let (name, color) = match sender {
            Sender::User => ("You", ANSI_BLUE),
            Sender::Bot => ("Chatbot", ""),
        };
        if self.use_color {
            format!("{ANSI_BOLD}{color}{name}:{ANSI_RESET}")
        } else {
            format!("{name}:")
        }
    }

    fn download_control(&self, url: &str) -> String {
        if self.use_color {
            format!(
                "{ANSI_BLUE}{OSC8_OPEN}{url}{OSC8_CLOSE}[{DOWNLOAD_LABEL}]{OSC8_OPEN}{OSC8_CLOSE}{ANSI_RESET} {url}"
            )
        } else {
            format!("[{DOWNLOAD_LABEL}] {url}")
        }
    }
}

impl<W: Write> TranscriptRenderer for PlainTextRenderer<W> {
    fn render_message(&mut self, message: &Message) -> Result<()> {
        self.clear_pending()?;
        self.rendered += 1;
        if message.is_user() && !self.echo_user {
            return Ok(());
        }
        let body = match message.kind() {
            MessageKind::DocumentLink if !message.is_user() => {
                self.download_control(message.text())
            }
            _ => message.text().to_string(),
        };
        let label = self.label(message.sender());
        writeln!(self.out, "{label} {body}")?;
        Ok(())
    }

    fn show_pending(&mut self, pending: bool) -> Result<()> {
        if !pending {
            self.clear_pending()?;
        } else if !self.pending_shown {
            self.pending_shown = true;
            if self.use_color {
                write!(self.out, "{ANSI_DIM}{PENDING_TEXT}{ANSI_RESET}")?;
            } else {
                writeln!(self.out, "{PENDING_TEXT}")?;
            }
        }
        self.flush()
    }

    fn scroll_to_latest(&mut self) -> Result<()> {
        // A terminal scrolls by itself once the text is out.
        self.scrolled_to = self.rendered;
        self.flush()
    }

    fn print_error(&mut self, error: &str) -> Result<()> {
        self.clear_pending()?;
        self.flush()?;
        let mut stderr = io::stderr().lock();
        if self.use_color {
            writeln!(stderr, "{ANSI_RED}Error: {error}{ANSI_RESET}")?;
        } else {
            writeln!(stderr, "Error: {error}")?;
        }
        Ok(())
    }

    fn print_info(&mut self, info: &str) -> Result<()> {
        self.clear_pending()?;
        writeln!(self.out, "{info}")?;
        self.flush()
    }
}

/// Subscribe `renderer` to `store`.
///
/// Every appended message is drawn and followed by
/// [`scroll_to_latest`](TranscriptRenderer::scroll_to_latest); pending changes
/// toggle the indicator. The renderer must not be borrowed while the store is
/// being mutated.
pub fn attach<T, R>(store: &ConversationStore<T>, renderer: Rc<RefCell<R>>) -> SubscriptionId
where
    T: ChatTransport,
    R: TranscriptRenderer + 'static,
{
    store.subscribe(move |event| {
        let mut renderer = renderer.borrow_mut();
        let drawn = match event {
            StoreEvent::HistoryAppended { message, .. } => renderer
                .render_message(message)
                .and_then(|()| renderer.scroll_to_latest()),
            StoreEvent::PendingChanged { pending } => renderer.show_pending(*pending),
            StoreEvent::DraftCleared => Ok(()),
        };
        if let Err(err) = drawn {
            tracing::warn!(error = %err, "could not draw transcript");
        }
    })
}
