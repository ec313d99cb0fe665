//! swearjar-admin CLI tool
//!
//! Talks to a running swearjar-node over its admin socket.
//!
//! Usage:
//!   swearjar-admin issue-session <user_id>
//!   swearjar-admin list-jars
//!   swearjar-admin grant <jar_id> <owner_id> <user_id>
//!   swearjar-admin revoke <jar_id> <owner_id> <user_id>
//!   swearjar-admin ping

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use swearjar_node::admin_socket::{default_socket_path, AdminCommand, AdminResponse};

fn print_usage() {
    eprintln!("swearjar-admin - Manage a swear jar node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  swearjar-admin issue-session <user_id>                Issue access + refresh tokens");
    eprintln!("  swearjar-admin list-jars                              List all jars");
    eprintln!("  swearjar-admin grant <jar_id> <owner_id> <user_id>    Grant edit permission");
    eprintln!("  swearjar-admin revoke <jar_id> <owner_id> <user_id>   Revoke edit permission");
    eprintln!("  swearjar-admin ping                                   Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SWEARJAR_SOCKET    Path to admin socket (default: $SWEARJAR_ADMIN_SOCKET, else $SWEARJAR_DATA_DIR/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("SWEARJAR_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_socket_path())
}

fn send_command(cmd: &AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to swearjar-node at {:?}: {}\n\
             Is the swearjar-node running?",
            socket_path, e
        )
    })?;

    // Send command
    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    // Read response
    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn require(args: &[String], count: usize, command: &str, names: &str) -> Vec<String> {
    if args.len() < count + 2 {
        eprintln!("Error: {} requires {}", command, names);
        std::process::exit(1);
    }
    args[2..count + 2].to_vec()
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match args[1].as_str() {
        "issue-session" => {
            let mut a = require(&args, 1, "issue-session", "a user_id argument");
            AdminCommand::IssueSession { user_id: a.remove(0) }
        }
        "list-jars" => AdminCommand::ListJars,
        "grant" | "revoke" => {
            let mut a = require(&args, 3, &args[1], "jar_id, owner_id and user_id arguments");
            let (jar_id, owner_id, user_id) = (a.remove(0), a.remove(0), a.remove(0));
            if args[1] == "grant" {
                AdminCommand::Grant { jar_id, owner_id, user_id }
            } else {
                AdminCommand::Revoke { jar_id, owner_id, user_id }
            }
        }
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(&cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::List { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    for item in items {
                        println!("{}", item);
                    }
                }
            }
            AdminResponse::Session { tokens } => {
                println!("user:          {}", tokens.user_id);
                println!("access token:  {}", tokens.access_token);
                println!("refresh token: {}", tokens.refresh_token);
            }
            AdminResponse::Pong => {
                println!("pong - swearjar-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
