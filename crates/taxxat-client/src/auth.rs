use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendError, TaxBackend};
use crate::models::{
    ForgotPasswordRequest, Identity, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
use crate::navigation::{Redirect, Route};
use crate::session::{SessionStore, SessionStoreError};


pub const MIN_PASSWORD_LEN: usize = 6;
pub const RESET_CODE_LEN: usize = 6;

pub const REGISTER_FAILURE_FALLBACK: &str = "Erro ao criar conta";
pub const LOGIN_FAILURE_FALLBACK: &str = "Erro ao fazer login";
pub const RESET_REQUEST_FAILURE_FALLBACK: &str = "Erro ao processar solicitação";
pub const RESET_FAILURE_FALLBACK: &str = "Erro ao redefinir senha";

pub const RESET_CODE_SENT_NOTICE: &str = "Código enviado! Verifique seu e-mail.";
pub const PASSWORD_RESET_NOTICE: &str = "Senha redefinida com sucesso! Redirecionando...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("As senhas não coincidem")]
    PasswordMismatch,
    #[error("A senha deve ter no mínimo {min} caracteres")]
    PasswordTooShort { min: usize },
    #[error("O código deve ter {expected} caracteres")]
    CodeLength { expected: usize },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
    #[error("Erro ao salvar sessão: {0}")]
    Session(#[from] SessionStoreError),
}

impl AuthError {
    fn backend(source: BackendError, fallback: &str) -> Self {
        Self::Backend {
            message: source.display_message(fallback),
            source,
        }
    }

    /// True when the request never left the client.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[derive(Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    /// CPF. Blank counts as not given.
    pub tax_id: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("tax_id", &self.tax_id)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct ResetForm {
    pub email: String,
    pub code: String,
    pub new_password: String,
    pub password_confirmation: String,
}

impl fmt::Debug for ResetForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetForm")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Progress through password recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PasswordReset {
    #[default]
    Idle,
    CodeRequested {
        email: String,
    },
    Completed,
}

fn validate_new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

fn validate_reset_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().count() != RESET_CODE_LEN {
        return Err(ValidationError::CodeLength {
            expected: RESET_CODE_LEN,
        });
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Register, login, logout and the two-step password reset.
///
/// The controller is the only writer of the session store.
pub struct AuthFlow {
    backend: Arc<dyn TaxBackend>,
    session: Arc<dyn SessionStore>,
    reset_delay: Duration,
    reset: Mutex<PasswordReset>,
}

impl AuthFlow {
    pub fn new(
        backend: Arc<dyn TaxBackend>,
        session: Arc<dyn SessionStore>,
        reset_delay: Duration,
    ) -> Self {
        Self {
            backend,
            session,
            reset_delay,
            reset: Mutex::new(PasswordReset::Idle),
        }
    }

    fn reset_state_mut(&self) -> MutexGuard<'_, PasswordReset> {
        self.reset.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.session.load()
    }

    pub async fn register(&self, form: RegisterForm) -> Result<Route, AuthError> {
        validate_new_password(&form.password, &form.password_confirmation)?;

        let email = form.email.trim().to_string();
        let request = RegisterRequest {
            nome: form.name.trim().to_string(),
            email: email.clone(),
            senha: form.password,
            cpf: non_blank(form.tax_id),
        };
        let identity = self.backend.register(request).await.map_err(|err| {
            warn!(email = %email, error = %err, "registration failed");
            AuthError::backend(err, REGISTER_FAILURE_FALLBACK)
        })?;

        self.session.save(&identity)?;
        info!(email = %identity.email, "account registered");
        Ok(Route::Dashboard)
    }

    pub async fn login(&self, form: LoginForm) -> Result<Route, AuthError> {
        let email = form.email.trim().to_string();
        let request = LoginRequest {
            email: email.clone(),
            senha: form.password,
        };
        let identity = self.backend.login(request).await.map_err(|err| {
            warn!(email = %email, error = %err, "login failed");
            AuthError::backend(err, LOGIN_FAILURE_FALLBACK)
        })?;

        self.session.save(&identity)?;
        info!(email = %identity.email, "logged in");
        Ok(Route::Dashboard)
    }

    /// Always ends logged out, whatever the backend says.
    pub async fn logout(&self) -> Route {
        if let Err(err) = self.backend.logout().await {
            warn!(error = %err, "remote logout failed; clearing local session anyway");
        }
        self.session.clear();
        info!("logged out");
        Route::Login
    }

    /// Asks the backend to email a verification code. A repeated call
    /// restarts the flow for the new address.
    pub async fn request_reset(&self, email: &str) -> Result<Redirect, AuthError> {
        let email = email.trim().to_string();
        self.backend
            .forgot_password(ForgotPasswordRequest {
                email: email.clone(),
            })
            .await
            .map_err(|err| {
                warn!(email = %email, error = %err, "password reset request failed");
                AuthError::backend(err, RESET_REQUEST_FAILURE_FALLBACK)
            })?;

        *self.reset_state_mut() = PasswordReset::CodeRequested {
            email: email.clone(),
        };
        info!(email = %email, "password reset code requested");
        Ok(Redirect::after(
            Route::ResetPassword { email: Some(email) },
            self.reset_delay,
        ))
    }

    /// Submits the code with the new password. Only the code's length is
    /// checked here; whether it matches is up to the backend.
    pub async fn reset_password(&self, form: ResetForm) -> Result<Redirect, AuthError> {
        validate_new_password(&form.new_password, &form.password_confirmation)?;
        let code = form.code.trim();
        validate_reset_code(code)?;

        let email = form.email.trim().to_string();
        let request = ResetPasswordRequest {
            email: email.clone(),
            token: code.to_string(),
            new_password: form.new_password,
        };
        self.backend.reset_password(request).await.map_err(|err| {
            warn!(email = %email, error = %err, "password reset failed");
            AuthError::backend(err, RESET_FAILURE_FALLBACK)
        })?;

        *self.reset_state_mut() = PasswordReset::Completed;
        info!(email = %email, "password reset completed");
        Ok(Redirect::after(Route::Login, self.reset_delay))
    }

    pub fn reset_state(&self) -> PasswordReset {
        self.reset_state_mut().clone()
    }

    /// Email carried over from the request step, used to prefill the reset form.
    pub fn reset_email(&self) -> Option<String> {
        match &*self.reset_state_mut() {
            PasswordReset::CodeRequested { email } => Some(email.clone()),
            PasswordReset::Idle | PasswordReset::Completed => None,
        }
    }

    pub fn abandon_reset(&self) {
        *self.reset_state_mut() = PasswordReset::Idle;
    }
}
