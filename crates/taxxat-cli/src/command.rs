use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        name: String,
        email: String,
        password: String,
        confirmation: String,
        tax_id: Option<String>,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Forgot {
        email: String,
    },
    Reset {
        code: String,
        password: String,
        confirmation: String,
        email: Option<String>,
    },
    Chat(String),
    History,
    Suggest(Option<usize>),
    /// Sends the prepared input buffer.
    Send,
    Select(PathBuf),
    Upload,
    Docs,
    WhoAmI,
    Route,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("comando desconhecido: {0}")]
    Unknown(String),
    #[error("uso: {0}")]
    Usage(&'static str),
}

const REGISTER_USAGE: &str = "register <nome completo> <email> <senha> <confirmação> [cpf]";
const LOGIN_USAGE: &str = "login <email> <senha>";
const FORGOT_USAGE: &str = "forgot <email>";
const RESET_USAGE: &str = "reset <código> <senha> <confirmação> [email]";
const CHAT_USAGE: &str = "chat <mensagem>";
const SUGGEST_USAGE: &str = "suggest [número]";
const SELECT_USAGE: &str = "select <arquivo>";

pub const HELP_TEXT: &str = "\
Comandos:
  register <nome completo> <email> <senha> <confirmação> [cpf]
  login <email> <senha>
  logout
  forgot <email>
  reset <código> <senha> <confirmação> [email]
  chat <mensagem>      (no painel, texto solto também é enviado)
  history              abre a conversa
  suggest [número]     lista as sugestões ou prepara uma pergunta
  send                 envia a pergunta preparada
  select <arquivo>     escolhe o documento a enviar
  upload               envia o documento escolhido
  docs                 lista os documentos enviados
  whoami | route | help | quit";

impl Command {
    /// The name may span several words; the first argument with an `@` is
    /// taken as the email.
    fn parse_register(args: &[&str]) -> Result<Self, CommandError> {
        let at = args
            .iter()
            .position(|arg| arg.contains('@'))
            .filter(|at| *at > 0)
            .ok_or(CommandError::Usage(REGISTER_USAGE))?;
        let (name, rest) = args.split_at(at);
        let (email, password, confirmation, tax_id) = match rest {
            [email, password, confirmation] => (email, password, confirmation, None),
            [email, password, confirmation, tax_id] => {
                (email, password, confirmation, Some(tax_id.to_string()))
            }
            _ => return Err(CommandError::Usage(REGISTER_USAGE)),
        };

        Ok(Self::Register {
            name: name.join(" "),
            email: email.to_string(),
            password: password.to_string(),
            confirmation: confirmation.to_string(),
            tax_id,
        })
    }

    /// `Ok(None)` for blank lines. Text that is not a command word becomes
    /// a chat message when `free_text_is_chat` is set.
    pub fn parse(line: &str, free_text_is_chat: bool) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        let Some(word) = line.split_whitespace().next() else {
            return Ok(None);
        };
        let rest = line[word.len()..].trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word {
            "register" => Self::parse_register(&args)?,
            "login" => match args.as_slice() {
                [email, password] => Self::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                _ => return Err(CommandError::Usage(LOGIN_USAGE)),
            },
            "logout" => Self::Logout,
            "forgot" => match args.as_slice() {
                [email] => Self::Forgot {
                    email: email.to_string(),
                },
                _ => return Err(CommandError::Usage(FORGOT_USAGE)),
            },
            "reset" => match args.as_slice() {
                [code, password, confirmation] => Self::Reset {
                    code: code.to_string(),
                    password: password.to_string(),
                    confirmation: confirmation.to_string(),
                    email: None,
                },
                [code, password, confirmation, email] => Self::Reset {
                    code: code.to_string(),
                    password: password.to_string(),
                    confirmation: confirmation.to_string(),
                    email: Some(email.to_string()),
                },
                _ => return Err(CommandError::Usage(RESET_USAGE)),
            },
            "chat" if rest.is_empty() => return Err(CommandError::Usage(CHAT_USAGE)),
            "chat" => Self::Chat(rest.to_string()),
            "history" => Self::History,
            "suggest" => match args.as_slice() {
                [] => Self::Suggest(None),
                [index] => index
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index > 0)
                    .map(|index| Self::Suggest(Some(index)))
                    .ok_or(CommandError::Usage(SUGGEST_USAGE))?,
                _ => return Err(CommandError::Usage(SUGGEST_USAGE)),
            },
            "send" => Self::Send,
            "select" if rest.is_empty() => return Err(CommandError::Usage(SELECT_USAGE)),
            "select" => Self::Select(PathBuf::from(rest)),
            "upload" => Self::Upload,
            "docs" => Self::Docs,
            "whoami" => Self::WhoAmI,
            "route" => Self::Route,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ if free_text_is_chat => Self::Chat(line.to_string()),
            unknown => return Err(CommandError::Unknown(unknown.to_string())),
        };

        Ok(Some(command))
    }
}
