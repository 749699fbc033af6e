use std::io;
use std::io::IsTerminal;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

#[derive(Clone, Copy, Debug)]
pub enum LabelColor {
    User,
    Assistant,
    Tool,
    ToolMeta,
    Thread,
    Error,
}

#[derive(Debug, Default)]
struct PromptState {
    label: Option<String>,
    visible: bool,
}

/// Terminal writer shared by the input loop and the renderer task. Transcript
/// lines go to stdout, client chatter and the prompt to stderr.
#[derive(Clone, Debug)]
pub struct Output {
    prompt: Arc<Mutex<PromptState>>,
    color: bool,
}

impl Output {
    pub fn new() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();
        let color = !no_color && io::stdout().is_terminal() && io::stderr().is_terminal();
        Self {
            prompt: Arc::new(Mutex::new(PromptState::default())),
            color,
        }
    }

    pub fn server_line(&self, line: &str) -> io::Result<()> {
        let mut prompt = self.lock();
        clear_prompt_line(&mut prompt)?;
        let mut stdout = io::stdout();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        write_prompt(&mut prompt)
    }

    pub fn client_line(&self, line: &str) -> io::Result<()> {
        let mut prompt = self.lock();
        clear_prompt_line(&mut prompt)?;
        let mut stderr = io::stderr();
        writeln!(stderr, "{line}")?;
        stderr.flush()
    }

    pub fn prompt(&self) -> io::Result<()> {
        write_prompt(&mut self.lock())
    }

    pub fn set_prompt(&self, label: &str) {
        self.lock().label = Some(label.to_string());
    }

    pub fn format_label(&self, label: &str, color: LabelColor) -> String {
        if !self.color {
            return label.to_string();
        }

        let code = match color {
            LabelColor::User => "35",
            LabelColor::Assistant => "32",
            LabelColor::Tool => "36",
            LabelColor::ToolMeta => "33",
            LabelColor::Thread => "34",
            LabelColor::Error => "31",
        };
        format!("\x1b[{code}m{label}\x1b[0m")
    }

    fn lock(&self) -> MutexGuard<'_, PromptState> {
        self.prompt.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn clear_prompt_line(prompt: &mut PromptState) -> io::Result<()> {
    if prompt.visible {
        let mut stderr = io::stderr();
        writeln!(stderr)?;
        stderr.flush()?;
        prompt.visible = false;
    }
    Ok(())
}

fn write_prompt(prompt: &mut PromptState) -> io::Result<()> {
    let Some(label) = prompt.label.as_ref() else {
        return Ok(());
    };
    let mut stderr = io::stderr();
    write!(stderr, "({label})> ")?;
    stderr.flush()?;
    prompt.visible = true;
    Ok(())
}
