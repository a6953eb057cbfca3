//! Command parsing and the application that runs them.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use rollcall_core::api::Transport;
use rollcall_core::auth::{FileTokenStore, RouteTracker, TokenStore};
use rollcall_core::config::TokenBackend;
use rollcall_core::notify::Notifier;
use rollcall_core::roster::UploadOutcome;
use rollcall_core::{
    ApiClient, Config, GuardDecision, HttpTransport, OfflineTransport, Route, RosterService,
    SessionController,
};

use crate::console::{render_page, ConsoleNotifier};

/// Env var supplying the login email non-interactively
const EMAIL_ENV: &str = "ROLLCALL_EMAIL";

/// Env var supplying the login password non-interactively
const PASSWORD_ENV: &str = "ROLLCALL_PASSWORD";

pub const USAGE: &str = "\
Usage: rollcall <command>

Commands:
  login [email]        Log in and store the session tokens
  logout               Forget the stored session
  status               Show session and configuration
  students [page]      List the roster, 5 students per page (page starts at 1)
  upload <file.csv>    Upload a roster CSV
  help                 Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Logout,
    Status,
    Students { page: usize },
    Upload { path: Option<PathBuf> },
    Help,
}

impl Command {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut args = args.into_iter();
        let command = match args.next().as_deref() {
            None | Some("help") | Some("--help") | Some("-h") => Command::Help,
            Some("login") => Command::Login { email: args.next() },
            Some("logout") => Command::Logout,
            Some("status") => Command::Status,
            Some("students") => {
                let page = match args.next() {
                    Some(raw) => {
                        let page: usize = raw
                            .parse()
                            .with_context(|| format!("Invalid page number: {}", raw))?;
                        if page == 0 {
                            bail!("Pages start at 1");
                        }
                        page - 1
                    }
                    None => 0,
                };
                Command::Students { page }
            }
            Some("upload") => Command::Upload {
                path: args.next().map(PathBuf::from),
            },
            Some(other) => bail!("Unknown command: {}", other),
        };

        if let Some(extra) = args.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(command)
    }
}

pub struct App {
    config: Config,
    /// API base URL, or why there is none. Only network commands need it.
    base_url: std::result::Result<String, String>,
    session: SessionController,
    roster: RosterService,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store = config.open_token_store()?;
        let base_url = config.base_url();
        Self::with_store(config, base_url, store)
    }

    fn with_store(config: Config, base_url: Result<String>, store: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = base_url.map_err(|e| e.to_string());
        let transport: Arc<dyn Transport> = match &base_url {
            Ok(url) => Arc::new(HttpTransport::new(url.clone()).context("Failed to build HTTP client")?),
            Err(reason) => {
                debug!(reason = %reason, "Running without an API");
                Arc::new(OfflineTransport::new(reason.clone()))
            }
        };
        let api = ApiClient::new(transport, store);

        let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
        let session = SessionController::new(api.clone(), notifier.clone(), Arc::new(RouteTracker::default()));
        let roster = RosterService::new(api, notifier);

        session.initialize();
        debug!(authenticated = session.is_authenticated(), "Session initialized");

        Ok(Self {
            config,
            base_url,
            session,
            roster,
        })
    }

    /// Run one command. Returns false when the command did not succeed; the
    /// reason has already been shown to the user.
    pub async fn run(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Help => {
                println!("{}", USAGE);
                Ok(true)
            }
            Command::Login { email } => self.login(email).await,
            Command::Logout => {
                self.session.logout();
                Ok(true)
            }
            Command::Status => self.status(),
            Command::Students { page } => {
                self.require_api()?;
                if !self.enter_dashboard() {
                    return Ok(false);
                }
                if self.roster.load().await.is_err() {
                    return Ok(false);
                }
                println!("{}", render_page(&self.roster.page(page)));
                Ok(true)
            }
            Command::Upload { path } => {
                self.require_api()?;
                if !self.enter_dashboard() {
                    return Ok(false);
                }
                let Ok(outcome) = self.roster.upload(path.as_deref()).await else {
                    return Ok(false);
                };
                match self.listing_after_upload(outcome) {
                    Some(listing) => {
                        println!("{}", listing);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }

    /// The roster is only reloaded after a clean upload; otherwise there is
    /// nothing fresh to show.
    fn listing_after_upload(&self, outcome: UploadOutcome) -> Option<String> {
        match outcome {
            UploadOutcome::Uploaded => Some(render_page(&self.roster.page(0))),
            UploadOutcome::UnexpectedResponse => None,
        }
    }

    fn require_api(&self) -> Result<()> {
        self.base_url
            .as_ref()
            .map(|_| ())
            .map_err(|reason| anyhow!("{}", reason))
    }

    fn enter_dashboard(&self) -> bool {
        self.session.guard().evaluate(Route::Dashboard).renders()
    }

    async fn login(&mut self, email: Option<String>) -> Result<bool> {
        if let GuardDecision::Redirect(_) = self.session.guard().evaluate(Route::Login) {
            println!("Already logged in. Run `rollcall logout` first to switch accounts.");
            return Ok(true);
        }
        self.require_api()?;

        let email = match email.or_else(|| std::env::var(EMAIL_ENV).ok()) {
            Some(email) => email,
            None => self.prompt_email()?,
        };
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) => password,
            Err(_) => rpassword::prompt_password("Password: ")?,
        };

        if email.is_empty() || password.is_empty() {
            bail!("Email and password required");
        }

        if self.session.login(&email, &password).await.is_err() {
            return Ok(false);
        }

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        Ok(true)
    }

    fn prompt_email(&self) -> Result<String> {
        match self.config.last_email {
            Some(ref last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        Ok(match (input.is_empty(), &self.config.last_email) {
            (true, Some(last)) => last.clone(),
            _ => input.to_string(),
        })
    }

    fn status(&self) -> Result<bool> {
        let session = self.session.session();
        println!(
            "Session:        {}",
            if session.is_authenticated { "logged in" } else { "logged out" }
        );
        if let Some(user) = session.user {
            println!("User:           {}", user.email);
        }
        println!(
            "API:            {}",
            self.base_url.as_deref().unwrap_or("not configured")
        );
        println!("Token storage:  {:?}", self.config.token_backend);

        if self.config.token_backend == TokenBackend::File {
            let store = FileTokenStore::new(self.config.data_dir()?);
            if let Some(updated) = store.updated_at()? {
                println!("Tokens saved:   {}", updated.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        Ok(true)
    }
}
