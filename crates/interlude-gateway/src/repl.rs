//! Terminal chat - line-based REPL over one thread

use futures::StreamExt;
use interlude_agent::{EventStream, Executor};
use interlude_core::{EventKind, ThreadId};
use serde_json::{json, Value};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

pub async fn run_repl(executor: Executor, thread_id: ThreadId) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!(
        "interlude chat on thread '{}' ({}). /quit or Ctrl-D to leave.",
        thread_id,
        executor.provider_name()
    );

    loop {
        let Some(line) = prompt(&mut input, "> ").await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let mut stream = match executor.submit(thread_id.clone(), line).await {
            Ok(stream) => stream,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };
        while let Some(payload) = render(&mut stream).await {
            let Some(answer) = ask_human(&mut input, &payload).await? else {
                return Ok(());
            };
            stream = match executor.resume(thread_id.clone(), answer).await {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("error: {}", e);
                    break;
                }
            };
        }
    }
    Ok(())
}

async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

/// Print a run's output. Returns the intervention payload if the run suspended.
async fn render(stream: &mut EventStream) -> Option<Value> {
    let mut interrupt = None;
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        match event.kind {
            EventKind::Content => {
                print!("{}", event.content);
                let _ = stdout.flush();
            }
            EventKind::ToolCall => {
                let name = event.get("tool_name").and_then(Value::as_str).unwrap_or("?");
                eprintln!("\n[calling {}]", name);
            }
            EventKind::ToolResult => {
                let failed = event.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                if failed {
                    eprintln!("[tool failed]");
                }
            }
            EventKind::InterventionRequired => {
                interrupt = Some(event.get("payload").cloned().unwrap_or(Value::Null));
            }
            EventKind::End => println!(),
            EventKind::Error => eprintln!("\nerror: {}", event.content),
            _ => {}
        }
    }
    interrupt
}

/// Collect a resume payload. `None` when stdin closes.
async fn ask_human(input: &mut Input, payload: &Value) -> anyhow::Result<Option<Value>> {
    if let Some(query) = payload.get("query").and_then(Value::as_str) {
        println!("The agent asks: {}", query);
        return Ok(prompt(input, "answer> ").await?.map(|a| json!({ "data": a.trim() })));
    }

    let name = payload.get("name").and_then(Value::as_str).unwrap_or("");
    let birthday = payload.get("birthday").and_then(Value::as_str).unwrap_or("");
    println!("Please review:\n  name:     {}\n  birthday: {}", name, birthday);
    let Some(correct) = prompt(input, "Is this correct? [y/n] ").await? else {
        return Ok(None);
    };
    if correct.trim().to_lowercase().starts_with('y') {
        return Ok(Some(json!({ "correct": "y" })));
    }

    let Some(new_name) = prompt(input, &format!("name [{}]: ", name)).await? else {
        return Ok(None);
    };
    let Some(new_birthday) = prompt(input, &format!("birthday [{}]: ", birthday)).await? else {
        return Ok(None);
    };
    let pick = |typed: &str, original: &str| {
        let typed = typed.trim();
        if typed.is_empty() {
            original.to_string()
        } else {
            typed.to_string()
        }
    };
    Ok(Some(json!({
        "correct": correct.trim(),
        "name": pick(&new_name, name),
        "birthday": pick(&new_birthday, birthday),
    })))
}
