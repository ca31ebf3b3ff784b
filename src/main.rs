use std::io::Write;
use std::sync::Arc;

use lontar::{Database, DirectoryStore, MemoryStore, SqlOutcome};
use rustyline::{error::ReadlineError, DefaultEditor, Result};
use tracing_subscriber::EnvFilter;

fn read_multiline_command(rl: &mut DefaultEditor) -> Result<String> {
    let mut input = String::new();
    let mut prompt = "lontar> ".to_string();

    loop {
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                let trimmed_line = line.trim_end();

                // Backslash at the end of a line continues the statement
                if trimmed_line.ends_with('\\') {
                    let mut line_without_backslash = trimmed_line.to_string();
                    line_without_backslash.pop();
                    input.push_str(&line_without_backslash);
                    input.push(' ');

                    prompt = "     -> ".to_string();
                } else {
                    input.push_str(trimmed_line);
                    break;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Ok(input)
}

struct Session {
    db: Database,
    dir: Option<Arc<DirectoryStore>>,
}

impl Session {
    async fn open(data_dir: Option<String>) -> lontar::Result<Self> {
        match data_dir {
            Some(path) => {
                let dir = Arc::new(DirectoryStore::open(&path).await?);
                let db = match dir.read_root().await? {
                    Some(root) => Database::from(dir.clone(), root).await?,
                    None => Database::create(dir.clone()),
                };
                Ok(Self { db, dir: Some(dir) })
            }
            None => Ok(Self {
                db: Database::create(Arc::new(MemoryStore::new())),
                dir: None,
            }),
        }
    }

    async fn run_sql(&mut self, sql: &str) -> lontar::Result<()> {
        match self.db.execute(sql).await? {
            SqlOutcome::Mutation(mutation) => {
                self.db = self.db.commit(&mutation).await?;
                if let Some(dir) = &self.dir {
                    dir.write_root(&mutation.root).await?;
                }
                println!("ok, root {}", mutation.root);
            }
            SqlOutcome::Query(mut result) => {
                println!("{}", result.columns.join(" | "));
                let mut count = 0;
                while let Some(row) = result.next().await? {
                    let cells: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
                    println!("{}", cells.join(" | "));
                    count += 1;
                }
                println!("({} rows)", count);
            }
        }
        Ok(())
    }
}

async fn process_command(session: &mut Session, command: &str) -> bool {
    let cmd = command.trim();

    match cmd.to_lowercase().as_str() {
        "exit" | "quit" | "q" => {
            println!("Goodbye!");
            return false;
        }
        "help" | "h" => {
            println!(
                r#"
Available commands:
  help, h          - Show this help message
  tables           - List tables in the current snapshot
  root             - Print the current root cid
  clear            - Clear the screen
  exit, quit, q    - Exit the database

Any other input is executed as SQL.
Use '\' at the end of a line for multiline input.
"#
            );
        }
        "tables" => {
            let names: Vec<String> = session
                .db
                .table_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            for name in names {
                match session.db.table_row_count(&name).await {
                    Ok(count) => println!("{} ({} rows)", name, count),
                    Err(e) => println!("{} (error: {})", name, e),
                }
            }
        }
        "root" => match session.db.root() {
            Some(root) => println!("{}", root),
            None => println!("(empty database, no root yet)"),
        },
        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            std::io::stdout().flush().unwrap();
        }
        "" => {}
        _ => {
            if let Err(e) = session.run_sql(cmd).await {
                println!("Error: {}", e);
            }
        }
    }

    true
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::args().nth(1);
    let mut session = match Session::open(data_dir).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    println!("lontar - content-addressed SQL. Type 'help' for commands.");

    let mut rl = DefaultEditor::new()?;

    loop {
        match read_multiline_command(&mut rl) {
            Ok(input) => {
                let command = input.trim().to_string();

                if !command.is_empty() {
                    rl.add_history_entry(&command)?;
                    if !process_command(&mut session, &command).await {
                        break;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
