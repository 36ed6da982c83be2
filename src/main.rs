use campus_session::cli::{
    Args, Command, build_config, init_logging, load_password, validate_api_url,
};
use campus_session::config::ClientConfig;
use campus_session::connect;
use campus_session::transport::ReqwestTransport;
use campus_session::{SessionRuntime, session::Session};
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(api_url) = validate_api_url(&args.api_url) else {
        std::process::exit(1);
    };

    // Read before the runtime starts: loading clears the variable, which is
    // only sound while this is the only thread.
    let password = match &args.command {
        Command::Login { .. } => match load_password() {
            Some(password) => Some(password),
            None => std::process::exit(1),
        },
        _ => None,
    };

    let config = build_config(&args, api_url);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start async runtime");
            std::process::exit(1);
        });

    let code = runtime.block_on(run(args.command, &config, password));
    std::process::exit(code);
}

async fn run(command: Command, config: &ClientConfig, password: Option<String>) -> i32 {
    let runtime = connect(config).unwrap_or_else(|e| {
        error!(error = %e, "Failed to set up client");
        std::process::exit(1);
    });

    let outcome = runtime.bootstrap().run().await;
    info!(outcome = ?outcome, "Bootstrap finished");

    let code = match command {
        Command::Login { username, remember } => {
            let password = password.unwrap_or_default();
            match runtime.auth().login(&username, &password, remember).await {
                Ok(session) => {
                    print_session(&session);
                    0
                }
                Err(e) => {
                    error!(username = %username, error = %e, "Login failed");
                    1
                }
            }
        }
        Command::Logout => {
            runtime.auth().logout().await;
            println!("Logged out");
            0
        }
        Command::Status => {
            print_session(&runtime.context().session());
            0
        }
        Command::Get { path } => get(&runtime, &path).await,
    };

    if let Err(e) = runtime.transport().save_cookies() {
        error!(error = %e, "Failed to save cookies");
        return 1;
    }
    code
}

async fn get(runtime: &SessionRuntime<ReqwestTransport>, path: &str) -> i32 {
    runtime.bootstrap().gate().wait_ready().await;
    match runtime.client().get_data::<Value>(path).await {
        Ok(data) => match serde_json::to_string_pretty(&data) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => {
                error!(error = %e, "Failed to format response");
                1
            }
        },
        Err(e) if e.is_forced_logout() => {
            error!(error = %e, "Session expired, log in again");
            1
        }
        Err(e) => {
            error!(path = %path, error = %e, "Request failed");
            1
        }
    }
}

fn print_session(session: &Session) {
    match session.credentials() {
        Some(credentials) => {
            println!("Logged in as user {} ({})", credentials.user_id, credentials.role)
        }
        None => println!("Not logged in"),
    }
}
