use clap::Parser;
use owo_colors::OwoColorize;
use songlang::cli::{generate_completions, Args, Commands};
use songlang::config::AppConfig;
use songlang::interpreter::{Interpreter, SongError, TokenParser};
use songlang::lexer::{tokenize, Token};
use std::io::{self, Read, Write};
use std::path::Path;

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);

    verbose_log(&config, "Starting songlang");

    let source = if let Some(inline) = &args.eval {
        verbose_log(&config, "Running inline source");
        Some(inline.clone())
    } else if let Some(path) = &args.script {
        verbose_log(&config, &format!("Reading script: {}", path.display()));
        match read_script(path) {
            Ok(text) => Some(text),
            Err(e) => {
                error_message(&config, &e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    match source {
        Some(source) => run_script(&source, &config),
        None => run_interactive(&config),
    }
}

fn read_script(path: &Path) -> Result<String, String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn fresh_interpreter(config: &AppConfig) -> Interpreter {
    let mut interpreter = Interpreter::new(|line: &str| println!("{}", line));
    if let Some(seed) = config.seed {
        interpreter.seed(seed);
    }
    interpreter
}

fn execute_chunk(interpreter: &mut Interpreter, source: &str) -> Result<(), SongError> {
    let tokens = tokenize(source)?;
    let statements = TokenParser::new(tokens).parse()?;
    interpreter.execute(&statements)?;
    Ok(())
}

fn run_script(source: &str, config: &AppConfig) {
    let mut interpreter = fresh_interpreter(config);
    match execute_chunk(&mut interpreter, source) {
        Ok(()) => {
            verbose_log(config, "Script executed successfully");
            if config.snapshot {
                let snapshot = interpreter.graph.to_snapshot().to_json();
                match serde_json::to_string_pretty(&snapshot) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        error_message(config, &format!("Snapshot serialization failed: {}", e))
                    }
                }
            }
        }
        Err(err) => {
            error_message(config, &err.render(source));
            std::process::exit(1);
        }
    }
}

fn run_interactive(config: &AppConfig) {
    println!("SongLang Interactive Shell");
    println!("Type statements to run them. :help lists shell commands; exit with Ctrl+D or 'exit'.");
    println!();

    let mut interpreter = fresh_interpreter(config);
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "song> " } else { "  ... " };
        print!("{}", prompt);
        io::stdout().flush().unwrap();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error_message(config, &format!("Error reading input: {}", e));
                break;
            }
        }
        let trimmed = line.trim();

        if pending.is_empty() {
            if trimmed == "exit" || trimmed == "quit" {
                break;
            }
            // Shell commands never reach the language core.
            if trimmed.starts_with(':') {
                match trimmed {
                    ":clear" | ":c" => {
                        interpreter = fresh_interpreter(config);
                        println!("Graph cleared");
                    }
                    ":graph" | ":g" => interpreter.dump_graph(),
                    ":help" | ":h" => print_help(),
                    other => println!("Unknown command: {}", other),
                }
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
        }

        pending.push_str(&line);
        if needs_continuation(&pending) {
            continue;
        }

        let chunk = std::mem::take(&mut pending);
        if let Err(err) = execute_chunk(&mut interpreter, &chunk) {
            error_message(config, &err.render(&chunk));
        }
    }
}

/// A chunk with more DO than END keywords is still being typed.
fn needs_continuation(source: &str) -> bool {
    match tokenize(source) {
        Ok(tokens) => {
            let mut depth = 0i64;
            for (token, _) in &tokens {
                match token {
                    Token::Do => depth += 1,
                    Token::End => depth -= 1,
                    _ => {}
                }
            }
            depth > 0
        }
        Err(_) => false,
    }
}

fn print_help() {
    println!("Shell commands:");
    println!("  :clear, :c   discard the graph and start fresh");
    println!("  :graph, :g   dump the current graph");
    println!("  :help, :h    show this help");
    println!("  exit, quit   leave the shell");
}

fn verbose_log(config: &AppConfig, message: &str) {
    if config.verbose {
        eprintln!("[songlang:debug] {}", message);
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
