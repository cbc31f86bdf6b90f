use std::io::{self, Write};

use taxxat_client::auth::{PASSWORD_RESET_NOTICE, RESET_CODE_SENT_NOTICE};
use taxxat_client::conversation::IgnoredReason;
use taxxat_client::uploads::{ACCEPTED_EXTENSIONS, UPLOAD_SUCCESS_NOTICE};
use taxxat_client::{
    ChatMessage, ChatRole, Dashboard, DashboardTab, LoginForm, RegisterForm, ResetForm, Route,
    SendOutcome, SubmitOutcome, TaxClient, UploadFile,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::command::{Command, HELP_TEXT};

enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    client: TaxClient,
    route: Route,
    dashboard: Option<Dashboard>,
}

impl Repl {
    pub fn new(client: TaxClient) -> Self {
        let route = client.gate().initial_route();
        Self {
            client,
            route,
            dashboard: None,
        }
    }

    pub async fn run(mut self) -> io::Result<()> {
        println!("TAXXAT - assistente do Imposto de Renda. Digite `help` para ver os comandos.");
        if self.route == Route::Dashboard {
            self.enter_dashboard().await;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{}> ", self.route);
            io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let free_text_is_chat = self.route == Route::Dashboard;
            let command = match Command::parse(&line, free_text_is_chat) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };

            if let Flow::Quit = self.handle(command).await {
                break;
            }
        }

        Ok(())
    }

    async fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Register {
                name,
                email,
                password,
                confirmation,
                tax_id,
            } => {
                let form = RegisterForm {
                    name,
                    email,
                    tax_id,
                    password,
                    password_confirmation: confirmation,
                };
                match self.client.auth().register(form).await {
                    Ok(route) => self.signed_in(route).await,
                    Err(err) => println!("{err}"),
                }
            }
            Command::Login { email, password } => {
                match self.client.auth().login(LoginForm::new(email, password)).await {
                    Ok(route) => self.signed_in(route).await,
                    Err(err) => println!("{err}"),
                }
            }
            Command::Logout => {
                let route = self.client.auth().logout().await;
                self.navigate(route).await;
            }
            Command::Forgot { email } => {
                self.route = Route::ForgotPassword;
                match self.client.auth().request_reset(&email).await {
                    Ok(redirect) => {
                        println!("{RESET_CODE_SENT_NOTICE}");
                        let route = redirect.follow().await;
                        self.navigate(route).await;
                    }
                    Err(err) => println!("{err}"),
                }
            }
            Command::Reset {
                code,
                password,
                confirmation,
                email,
            } => {
                let Some(email) = email.or_else(|| self.client.auth().reset_email()) else {
                    println!("Informe o email: reset <código> <senha> <confirmação> <email>");
                    return Flow::Continue;
                };
                let form = ResetForm {
                    email,
                    code,
                    new_password: password,
                    password_confirmation: confirmation,
                };
                match self.client.auth().reset_password(form).await {
                    Ok(redirect) => {
                        println!("{PASSWORD_RESET_NOTICE}");
                        let route = redirect.follow().await;
                        self.client.auth().abandon_reset();
                        self.navigate(route).await;
                    }
                    Err(err) => println!("{err}"),
                }
            }
            Command::Chat(text) => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    send_and_print(dashboard, &text).await;
                }
            }
            Command::History => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    dashboard.switch_tab(DashboardTab::Chat).await;
                    print_messages(&dashboard.conversation().messages());
                }
            }
            Command::Suggest(pick) => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    let conversation = dashboard.conversation();
                    let suggestions = conversation.suggestions();
                    match pick {
                        None if suggestions.is_empty() => {
                            println!("Sem sugestões: a conversa já começou.")
                        }
                        None => {
                            for (index, suggestion) in suggestions.iter().enumerate() {
                                println!("  {}. {}", index + 1, suggestion.label);
                            }
                        }
                        Some(index) => match conversation.pick_suggestion(index - 1) {
                            Some(suggestion) => println!(
                                "Pergunta: {}  (use `send` para enviar)",
                                suggestion.prompt
                            ),
                            None => println!("Sugestão {index} indisponível."),
                        },
                    }
                }
            }
            Command::Send => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    let conversation = dashboard.conversation();
                    let before = conversation.messages().len();
                    let outcome = conversation.submit_input().await;
                    print_outcome(dashboard, before, outcome);
                }
            }
            Command::Select(path) => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    match UploadFile::read(&path).await {
                        Ok(file) => {
                            let name = file.file_name.clone();
                            if dashboard.uploads().select_file(file).is_none() {
                                println!(
                                    "Aviso: formatos aceitos são {}.",
                                    ACCEPTED_EXTENSIONS.join(", ")
                                );
                            }
                            println!("Selecionado: {name}");
                        }
                        Err(err) => println!("{err}"),
                    }
                }
            }
            Command::Upload => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    match dashboard.uploads().submit().await {
                        Ok(SubmitOutcome::NothingSelected) => {
                            println!("Nenhum arquivo selecionado. Use `select <arquivo>`.")
                        }
                        Ok(SubmitOutcome::AlreadyInFlight) => println!("Envio em andamento."),
                        Ok(SubmitOutcome::Uploaded { .. }) => {
                            println!("{UPLOAD_SUCCESS_NOTICE}");
                            print_documents(dashboard);
                        }
                        Err(err) => println!("{err}"),
                    }
                }
            }
            Command::Docs => {
                if let Some(dashboard) = self.enter_dashboard().await {
                    dashboard.switch_tab(DashboardTab::Documents).await;
                    print_documents(dashboard);
                }
            }
            Command::WhoAmI => match self.client.identity() {
                Some(identity) => println!("{} <{}>", identity.name, identity.email),
                None => println!("Nenhum usuário conectado."),
            },
            Command::Route => println!("{}", self.route),
            Command::Help => println!("{HELP_TEXT}"),
            Command::Quit => return Flow::Quit,
        }

        Flow::Continue
    }

    /// A successful login or register starts over with the new identity.
    async fn signed_in(&mut self, route: Route) {
        self.dashboard = None;
        self.navigate(route).await;
    }

    async fn navigate(&mut self, requested: Route) {
        let route = self.client.gate().enter(requested);
        debug!(route = %route, "navigated");
        if route == Route::Dashboard {
            self.route = route;
            self.enter_dashboard().await;
        } else {
            self.dashboard = None;
            self.route = route;
        }
    }

    /// Gate check before any dashboard command. Opens the dashboard on first
    /// entry, drops it when the session is gone and reopens it when the
    /// stored identity is no longer the one it was opened for.
    async fn enter_dashboard(&mut self) -> Option<&Dashboard> {
        let route = self.client.gate().enter(Route::Dashboard);
        if route != Route::Dashboard {
            self.dashboard = None;
            self.route = route;
            println!("Faça login para acessar o painel.");
            return None;
        }
        self.route = Route::Dashboard;

        let current = self.client.identity();
        if self
            .dashboard
            .as_ref()
            .is_some_and(|dashboard| current.as_ref() != Some(dashboard.identity()))
        {
            debug!("stored identity changed; reopening the dashboard");
            self.dashboard = None;
        }

        if self.dashboard.is_none() {
            let dashboard = match self.client.open_dashboard() {
                Ok(dashboard) => dashboard,
                Err(err) => {
                    println!("{err}");
                    return None;
                }
            };
            println!("Olá, {}!", dashboard.identity().name);
            dashboard.switch_tab(DashboardTab::Chat).await;
            self.dashboard = Some(dashboard);
        }
        self.dashboard.as_ref()
    }
}

async fn send_and_print(dashboard: &Dashboard, text: &str) {
    let before = dashboard.conversation().messages().len();
    let outcome = dashboard.conversation().send(text).await;
    print_outcome(dashboard, before, outcome);
}

fn print_outcome(dashboard: &Dashboard, before: usize, outcome: SendOutcome) {
    match outcome {
        SendOutcome::Ignored(IgnoredReason::Empty) => {}
        SendOutcome::Ignored(IgnoredReason::ReplyPending) => {
            println!("Aguarde a resposta anterior.")
        }
        SendOutcome::Replied | SendOutcome::Fallback => {
            let messages = dashboard.conversation().messages();
            print_messages(messages.get(before..).unwrap_or_default());
        }
    }
}

fn print_messages(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("Nenhuma mensagem ainda. Experimente `suggest`.");
    }
    for message in messages {
        let speaker = match message.role {
            ChatRole::User => "você",
            ChatRole::Assistant => "taxxat",
        };
        println!("[{speaker}] {}", message.text);
    }
}

fn print_documents(dashboard: &Dashboard) {
    let documents = dashboard.uploads().documents();
    if documents.is_empty() {
        println!("Nenhum documento enviado ainda.");
        return;
    }
    for document in documents {
        println!(
            "  {}  {}  {}",
            document.display_date(),
            document.original_filename,
            document.status
        );
    }
}
