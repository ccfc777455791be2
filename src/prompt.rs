//! Interactive prompts used by the composer.
//!
//! [`Prompter`] is the seam between the reconciliation flow and whatever
//! asks the user questions. Every method returns
//! [`ComposeError::Cancelled`] when the user aborts, so callers can tell an
//! abort apart from an answer.

use dialoguer::{
    Confirm,
    Input,
    MultiSelect,
    Password,
    Select,
};

use crate::error::{
    ComposeError,
    ComposeResult,
};

/// Parameters for a free-text prompt.
#[derive(Debug, Clone, Default)]
pub struct InputRequest {
    /// Question shown to the user.
    pub title: String,
    /// Value used when the user submits nothing.
    pub default: Option<String>,
    /// Hide typed characters and the default.
    pub masked: bool,
    /// Guidance printed above the prompt.
    pub instruction: Option<String>,
    /// Short hint printed above the prompt, e.g. a dashboard link.
    pub hint: Option<String>,
}

/// Supplier of user answers.
pub trait Prompter {
    /// Picks one of `items`, returning its index.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Cancelled`] if the user aborts.
    fn select(&mut self, title: &str, items: &[String]) -> ComposeResult<usize>;

    /// Picks any subset of `items`, pre-checking those flagged in `defaults`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Cancelled`] if the user aborts.
    fn multiselect(
        &mut self,
        title: &str,
        items: &[String],
        defaults: &[bool],
    ) -> ComposeResult<Vec<usize>>;

    /// Reads one line of text.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Cancelled`] if the user aborts.
    fn input(&mut self, request: &InputRequest) -> ComposeResult<String>;

    /// Asks a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Cancelled`] if the user aborts.
    fn confirm(&mut self, title: &str, default: bool) -> ComposeResult<bool>;
}

impl<P: Prompter + ?Sized> Prompter for &mut P {
    fn select(&mut self, title: &str, items: &[String]) -> ComposeResult<usize> {
        (**self).select(title, items)
    }

    fn multiselect(
        &mut self,
        title: &str,
        items: &[String],
        defaults: &[bool],
    ) -> ComposeResult<Vec<usize>> {
        (**self).multiselect(title, items, defaults)
    }

    fn input(&mut self, request: &InputRequest) -> ComposeResult<String> {
        (**self).input(request)
    }

    fn confirm(&mut self, title: &str, default: bool) -> ComposeResult<bool> {
        (**self).confirm(title, default)
    }
}

/// [`Prompter`] on the terminal via `dialoguer`. Esc and Ctrl-C cancel.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Creates a terminal prompter.
    pub fn new() -> Self {
        Self
    }
}

fn prompt_error(e: dialoguer::Error) -> ComposeError {
    match e {
        dialoguer::Error::IO(io) if io.kind() == std::io::ErrorKind::Interrupted => {
            ComposeError::Cancelled
        }
        other => ComposeError::PromptFailed(other.to_string()),
    }
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, title: &str, items: &[String]) -> ComposeResult<usize> {
        Select::new()
            .with_prompt(title)
            .items(items)
            .default(0)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(ComposeError::Cancelled)
    }

    fn multiselect(
        &mut self,
        title: &str,
        items: &[String],
        defaults: &[bool],
    ) -> ComposeResult<Vec<usize>> {
        MultiSelect::new()
            .with_prompt(title)
            .items(items)
            .defaults(defaults)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(ComposeError::Cancelled)
    }

    fn input(&mut self, request: &InputRequest) -> ComposeResult<String> {
        if let Some(instruction) = &request.instruction {
            println!("{}", instruction);
        }
        if let Some(hint) = &request.hint {
            println!("  {}", hint);
        }
        if request.masked {
            let title = match request.default {
                Some(_) => format!("{} (Enter for default: [hidden])", request.title),
                None => request.title.clone(),
            };
            let value = Password::new()
                .with_prompt(title)
                .allow_empty_password(true)
                .interact()
                .map_err(prompt_error)?;
            return Ok(match (&request.default, value.is_empty()) {
                (Some(default), true) => default.clone(),
                _ => value,
            });
        }
        let mut input = Input::<String>::new()
            .with_prompt(&request.title)
            .allow_empty(true);
        if let Some(default) = &request.default {
            input = input.default(default.clone());
        }
        input.interact_text().map_err(prompt_error)
    }

    fn confirm(&mut self, title: &str, default: bool) -> ComposeResult<bool> {
        Confirm::new()
            .with_prompt(title)
            .default(default)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(ComposeError::Cancelled)
    }
}
