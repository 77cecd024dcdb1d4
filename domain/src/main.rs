use std::env;
use std::process;
use std::time::SystemTime;

use domain::adapters::memory_repo::InMemoryRedirectRepo;
use domain::id::Base62IdGenerator;
use domain::service::{NewRedirect, RedirectRequest, RedirectResponse, RedirectService};
use domain::{Clock, Policy, ServiceError};

struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

fn print_usage() {
    eprintln!(
        "{} v{} — redirect engine demo CLI\n\nUsage:\n  domain create <source> <target> [--status <code>] [--notes <text>]\n  domain resolve <path>\n\nNotes:\n  - This demo CLI uses an in-memory repository; data is not persisted across runs.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    // Construct a demo service with in-memory storage
    let repo = InMemoryRedirectRepo::new();
    let ids = Base62IdGenerator::new(1);
    let clock = StdClock;
    let svc = RedirectService::new(repo, ids, clock, Policy::default());

    let request = match cmd.as_str() {
        "create" => {
            let Some(source) = args.next() else {
                return Err("missing <source> for create".into());
            };
            let Some(target) = args.next() else {
                return Err("missing <target> for create".into());
            };

            let mut status_code = None;
            let mut notes = None;

            // Parse simple flags: --status <code>, --notes <text>
            let rest: Vec<String> = args.collect();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--status" => {
                        if i + 1 >= rest.len() {
                            return Err("--status requires a value".into());
                        }
                        match rest[i + 1].parse::<u16>() {
                            Ok(code) => status_code = Some(code),
                            Err(_) => return Err("invalid --status code".into()),
                        }
                        i += 2;
                    }
                    "--notes" => {
                        if i + 1 >= rest.len() {
                            return Err("--notes requires a value".into());
                        }
                        notes = Some(rest[i + 1].clone());
                        i += 2;
                    }
                    unk => {
                        return Err(format!("unknown argument: {}", unk));
                    }
                }
            }

            RedirectRequest::Create(NewRedirect {
                source_path: source,
                target_path: target,
                status_code,
                created_by: Some("dev@local".to_string()),
                notes,
            })
        }
        "resolve" => {
            let Some(path) = args.next() else {
                return Err("missing <path> for resolve".into());
            };
            RedirectRequest::Resolve { path }
        }
        _ => {
            print_usage();
            return Ok(());
        }
    };

    match svc.dispatch(request) {
        Ok(RedirectResponse::Redirect(redirect)) => {
            println!(
                "created: {} -> {} ({})",
                redirect.source_path, redirect.target_path, redirect.status_code
            );
            Ok(())
        }
        Ok(RedirectResponse::Resolved(Some(resolution))) => {
            println!("{} ({})", resolution.target, resolution.status_code);
            Ok(())
        }
        Ok(RedirectResponse::Resolved(None)) => Err("not found".into()),
        Ok(other) => Err(format!("unexpected response: {:?}", other)),
        Err(ServiceError::Invalid(errors)) => {
            let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            Err(format!("validation failed:\n  {}", lines.join("\n  ")))
        }
        Err(ServiceError::Repository(e)) => Err(format!("storage failed: {}", e)),
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
