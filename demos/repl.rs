use lispy::Error;
use lispy::ast::Value;
use lispy::environment::Environment;
use lispy::evaluator::{eval, standard_environment, with_eval_stack};
use lispy::reader::{Reader, is_incomplete, read_all};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::panic;
use std::process;

fn main() {
    let result = panic::catch_unwind(|| {
        // Evaluation runs on a thread with room for the full nesting depth
        let outcome = with_eval_stack(|| {
            let env = standard_environment();
            // Any arguments are source files to load before the prompt starts
            for path in std::env::args().skip(1) {
                if let Err(err) = load_file(&path, &env) {
                    eprintln!("{path}: {err}");
                    return false;
                }
            }
            run_repl(&env);
            true
        });
        match outcome {
            Ok(true) => {}
            Ok(false) => process::exit(1),
            Err(err) => {
                eprintln!("Could not start the evaluator: {err}");
                process::exit(1);
            }
        }
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Evaluate every expression in a file, stopping at the first error
fn load_file(path: &str, env: &Environment) -> Result<(), String> {
    let file = File::open(path).map_err(|err| err.to_string())?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| err.to_string())?;
    for expr in Reader::new(lines.into_iter()) {
        let expr = expr.map_err(|err| err.to_string())?;
        eval(&expr, env).map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn run_repl(env: &Environment) {
    println!("lispy: a minimal Scheme evaluator with proper tail calls");
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };

    // Lines of an expression that is not yet complete
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "lispy> " } else { "...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                buffer.push_str(&line);
                buffer.push('\n');

                match read_all(&buffer) {
                    // Keep reading until the expression and any string literal are closed
                    Err(err) if is_incomplete(&err) => continue,
                    Err(err) => println!("Error: {err}"),
                    Ok(exprs) => {
                        for expr in &exprs {
                            if let Err(err) = eval_and_print(expr, env) {
                                println!("Error: {err}");
                                break;
                            }
                        }
                    }
                }

                let _ = rl.add_history_entry(buffer.trim_end());
                buffer.clear();
            }

            Err(ReadlineError::Interrupted) => {
                // Ctrl+C abandons a partial expression
                buffer.clear();
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn eval_and_print(expr: &Value, env: &Environment) -> Result<(), Error> {
    let result = eval(expr, env)?;
    // Don't print Unspecified values (e.g., from define)
    if !matches!(result, Value::Unspecified) {
        println!("{result}");
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Discard the expression being entered");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  quote ' quasiquote ` unquote , unquote-splicing ,@");
    println!("  if define set! lambda begin and or");
    println!();
    println!("Examples:");
    println!("  (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))");
    println!("  (fact 10)");
    println!("  (map (lambda (x) (* x x)) '(1 2 3))");
    println!("  `(1 ,(+ 1 1) ,@(list 3 4))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Builtin(_) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
