use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use clinic_booking::auth_flow::{AuthOutcome, CREATING_ACCOUNT, SIGNING_IN};
use clinic_booking::config::ClinicConfig;
use clinic_booking::gateway::{Gateway, SupabaseGateway};
use clinic_booking::management::{AppointmentCard, AppointmentsView, CancelOutcome};
use clinic_booking::session_guard::{GuardOutcome, Route};
use clinic_booking::session_store::{SessionStore, DEFAULT_SESSION_FILE};
use clinic_booking::validation::{LoginForm, RegistrationForm};
use clinic_booking::Clinic;

#[derive(Parser, Debug)]
#[clap(name = "clinic", version)]
#[clap(about = "Book and manage clinic appointments", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Where the signed-in session is kept between runs.
    #[clap(long, global = true, env = "CLINIC_SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,

    /// Log debug output to stderr.
    #[clap(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[clap(long)]
        email: String,
        #[clap(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[clap(long)]
        email: String,
        #[clap(long)]
        password: String,
        #[clap(long)]
        confirm_password: String,
        #[clap(long)]
        first_name: String,
        #[clap(long)]
        last_name: String,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List doctors and their availability
    Doctors,
    /// Book an appointment
    Book {
        /// Doctor name exactly as listed by `clinic doctors`
        #[clap(long)]
        doctor: String,
        #[clap(long)]
        day: String,
        #[clap(long)]
        time: String,
        /// Month name, optionally with its year ("May" or "May 2026")
        #[clap(long)]
        month: String,
        /// Week of the month, 1 to 4
        #[clap(long)]
        week: u8,
        #[clap(long, default_value = "")]
        reason: String,
    },
    /// List your appointments
    Appointments,
    /// Cancel an appointment by its id
    Cancel {
        entry_id: Uuid,
        /// Record holding the appointment; defaults to your own
        #[clap(long)]
        record: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

async fn require_signed_in(clinic: &Clinic) -> anyhow::Result<()> {
    match clinic.guard().protect_page().await {
        GuardOutcome::Allow => Ok(()),
        GuardOutcome::Redirect(_) => bail!("Not signed in. Run `clinic login` first."),
    }
}

async fn require_signed_out(clinic: &Clinic) -> anyhow::Result<()> {
    match clinic.guard().redirect_if_logged_in().await {
        GuardOutcome::Redirect(Route::Logout) => {
            bail!("Already signed in. Run `clinic logout` first.")
        }
        _ => Ok(()),
    }
}

fn report(outcome: AuthOutcome) -> anyhow::Result<()> {
    match outcome.message {
        Some(message) if message.is_error() => Err(anyhow!(message.text)),
        Some(message) => {
            println!("{}", message);
            Ok(())
        }
        None => Ok(()),
    }
}

fn print_card(card: &AppointmentCard) {
    println!("{}  {} ({})", card.entry_id, card.doctor_name, card.specialty);
    println!("    {} at {}", card.when, card.time);
    if !card.reason.is_empty() {
        println!("    {}", card.reason);
    }
}

async fn execute(clinic: &Clinic, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            require_signed_out(clinic).await?;
            eprintln!("{}", SIGNING_IN);
            report(clinic.auth().login(&LoginForm::new(email, password)).await)
        }
        Commands::Register {
            email,
            password,
            confirm_password,
            first_name,
            last_name,
        } => {
            require_signed_out(clinic).await?;
            let form = RegistrationForm {
                email,
                password,
                confirm_password,
                first_name,
                last_name,
            };
            eprintln!("{}", CREATING_ACCOUNT);
            report(clinic.auth().register(&form).await)
        }
        Commands::Logout => {
            let outcome = clinic.auth().logout().await;
            if outcome.succeeded() {
                println!("Signed out.");
            }
            report(outcome)
        }
        Commands::Whoami => {
            require_signed_in(clinic).await?;
            let user = clinic.gateway().get_current_user().await?;
            let name = |key: &str| user.metadata_str(key).unwrap_or("").to_string();
            println!("{} {}", name("first_name"), name("last_name"));
            println!("{}", user.email.as_deref().unwrap_or("(no email)"));
            println!("id: {}", user.id);
            Ok(())
        }
        Commands::Doctors => {
            let booking = clinic.booking();
            for card in booking.load_doctors().await? {
                println!("{} - {}", card.name, card.specialty);
                println!("    Available days: {}", card.days);
                println!("    Time slots: {}", card.time_range);
            }
            Ok(())
        }
        Commands::Book {
            doctor,
            day,
            time,
            month,
            week,
            reason,
        } => {
            require_signed_in(clinic).await?;
            let booking = clinic.booking();
            booking.load_doctors().await?;
            booking.select_doctor(&doctor)?;
            booking.choose_day(&day)?;
            booking.choose_time(&time)?;
            booking.choose_month(&month)?;
            booking.choose_week(week)?;
            booking.set_reason(&reason)?;

            let entry = booking.confirm().await?;
            println!("Appointment booked: {}", entry.id);
            println!(
                "    {} on {} at {}",
                entry.doctor_name,
                entry.date_line(),
                entry.time
            );
            Ok(())
        }
        Commands::Appointments => {
            require_signed_in(clinic).await?;
            match clinic.appointments().load().await {
                AppointmentsView::Empty => println!("You have no appointments yet."),
                AppointmentsView::List(cards) => cards.iter().for_each(print_card),
                AppointmentsView::Unavailable(message) => bail!(message),
            }
            Ok(())
        }
        Commands::Cancel { entry_id, record } => {
            require_signed_in(clinic).await?;
            let manager = clinic.appointments();
            let record_id = match record {
                Some(id) => id,
                None => match manager.load().await {
                    AppointmentsView::List(cards) => cards
                        .into_iter()
                        .find(|c| c.entry_id == entry_id)
                        .map(|c| c.record_id)
                        .ok_or_else(|| anyhow!("No appointment with id {}", entry_id))?,
                    AppointmentsView::Empty => bail!("You have no appointments."),
                    AppointmentsView::Unavailable(message) => bail!(message),
                },
            };
            match manager.cancel(&record_id, entry_id).await? {
                CancelOutcome::Reload => {
                    println!("Appointment cancelled.");
                    Ok(())
                }
                CancelOutcome::Failed(message) => bail!(message),
            }
        }
    }
}

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClinicConfig::from_env()?;
    let gateway = Arc::new(SupabaseGateway::new(config)?);
    let store = SessionStore::new(&cli.session_file);
    if let Some(session) = store
        .load()
        .with_context(|| format!("Failed to read {}", store.path().display()))?
    {
        gateway.restore_session(session);
    }

    let clinic = Clinic::new(gateway.clone());
    let result = execute(&clinic, cli.command).await;

    // Tokens may have been refreshed, issued or revoked.
    match gateway.current_session() {
        Some(session) => store.save(&session)?,
        None => store.clear()?,
    }
    result
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
