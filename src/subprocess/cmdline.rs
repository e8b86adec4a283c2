//! Conversion between a command line given as one string and the list of
//! arguments it stands for.
//!
//! Only double quotes and backslash escapes are understood:
//! - whitespace outside quotes separates arguments;
//! - `"` opens a quoted region in which whitespace is literal;
//! - inside quotes `\"` and `\\` stand for `"` and `\`, any other backslash
//!   is literal, as is every backslash outside quotes;
//! - a quote that is never closed is kept literally together with the rest
//!   of the string.

/// Argument vector of a command; element zero names the executable.
pub type CommandLine = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    Blank,
    Word,
    Quoted { start: usize, prefix_len: usize },
}

struct SplitFSM {
    input: Vec<char>,
    pos: usize,
    state: SplitState,
    current: String,
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

impl SplitFSM {
    fn new(cmd: &str) -> Self {
        SplitFSM {
            input: cmd.chars().collect(),
            pos: 0,
            state: SplitState::Blank,
            current: String::new(),
        }
    }

    fn make_args(&mut self) -> CommandLine {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                SplitState::Blank => self.handle_blank(ch),
                SplitState::Word => self.handle_word(ch, &mut out),
                SplitState::Quoted { .. } => self.handle_quoted(ch),
            }
        }

        match self.state {
            SplitState::Blank => {}
            SplitState::Word => out.push(std::mem::take(&mut self.current)),
            SplitState::Quoted { start, prefix_len } => {
                // unterminated: the quote and everything after it is literal
                self.current.truncate(prefix_len);
                self.current.extend(&self.input[start..]);
                out.push(std::mem::take(&mut self.current));
            }
        }
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn open_quote(&mut self) {
        self.state = SplitState::Quoted {
            start: self.pos - 1,
            prefix_len: self.current.len(),
        };
    }

    fn handle_blank(&mut self, ch: char) {
        match ch {
            c if is_blank(c) => {}
            '"' => self.open_quote(),
            c => {
                self.current.push(c);
                self.state = SplitState::Word;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut CommandLine) {
        match ch {
            c if is_blank(c) => {
                out.push(std::mem::take(&mut self.current));
                self.state = SplitState::Blank;
            }
            '"' => self.open_quote(),
            c => self.current.push(c),
        }
    }

    fn handle_quoted(&mut self, ch: char) {
        match ch {
            '"' => self.state = SplitState::Word,
            '\\' if matches!(self.peek_char(), Some('"' | '\\')) => {
                if let Some(escaped) = self.read_char() {
                    self.current.push(escaped);
                }
            }
            c => self.current.push(c),
        }
    }
}

/// Split a command line string into its arguments.
///
/// ```
/// use basis_utils::subprocess::cmdline;
/// let args = cmdline::split(r#"cp "my file.txt" backup\"#);
/// assert_eq!(args, ["cp", "my file.txt", "backup\\"]);
/// ```
pub fn split(cmd: &str) -> CommandLine {
    SplitFSM::new(cmd).make_args()
}

fn needs_quotes(arg: &str) -> bool {
    arg.is_empty() || arg.chars().any(|c| is_blank(c) || c == '"' || c == '\\')
}

/// Join arguments to a command line string that [`split`] turns back into
/// the same arguments.
pub fn to_string<S: AsRef<str>>(args: &[S]) -> String {
    let mut cmd = String::new();
    for arg in args {
        let arg = arg.as_ref();
        if !cmd.is_empty() {
            cmd.push(' ');
        }
        if !needs_quotes(arg) {
            cmd.push_str(arg);
            continue;
        }
        cmd.push('"');
        for c in arg.chars() {
            if c == '"' || c == '\\' {
                cmd.push('\\');
            }
            cmd.push(c);
        }
        cmd.push('"');
    }
    cmd
}
