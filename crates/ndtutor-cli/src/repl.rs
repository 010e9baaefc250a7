//! Interactive proof session.
//!
//! Nodes are addressed by `root`, `.` (the focused node) or any unique prefix
//! of their id as shown by `show`.

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use ndtutor_core::{Feedback, Rule};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::render;
use crate::session::{Completion, Session, SessionError};

pub struct ReplState {
    session: Session,
    runtime: Runtime,
}

impl ReplState {
    pub fn new(session: Session, runtime: Runtime) -> Self {
        Self { session, runtime }
    }
}

pub fn run(mut state: ReplState) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    println!("{}", "ndtutor proof session".green().bold());
    println!("Type `help` for commands. Type `exit` to quit.\n");
    print!("{}", render::render_tree(state.session.tree(), state.session.tree().focus()));

    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    loop {
        let line = match rl.readline("nd> ") {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        let tokens = split_command_line(line);
        match dispatch_repl_line_result(&mut state, &tokens) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplControl {
    Continue,
    Exit,
}

pub(crate) fn dispatch_repl_line_result(state: &mut ReplState, tokens: &[String]) -> Result<ReplControl> {
    if tokens.is_empty() {
        return Ok(ReplControl::Continue);
    }

    let cmd = tokens[0].as_str();
    let args = &tokens[1..];

    match cmd {
        "help" | "?" => print_help(),
        "exit" | "quit" => return Ok(ReplControl::Exit),
        "show" | "tree" => {
            let from = match args.first() {
                Some(r) => state.session.resolve(r)?,
                None => state.session.tree().focus(),
            };
            print!("{}", render::render_tree(state.session.tree(), from));
        }
        "goals" => {
            let tree = state.session.tree();
            for id in tree.open_goals(tree.root_id()) {
                if let Some(node) = tree.node(id) {
                    println!("{}  {}", render::short_id(id), node.statement);
                }
            }
        }
        "rules" => {
            for rule in state.session.rules() {
                println!("{}", render::render_rule(rule));
            }
        }
        "focus" => {
            let Some(reference) = args.first() else {
                bail!("usage: focus <node>");
            };
            let node = state.session.resolve(reference)?;
            state.session.focus(node)?;
            print!("{}", render::render_tree(state.session.tree(), node));
        }
        "root" => {
            state.session.focus_root();
            print!("{}", render::render_tree(state.session.tree(), state.session.tree().root_id()));
        }
        "apply" => cmd_apply(state, args)?,
        "slots" => {
            let [reference, rule, ..] = args else {
                bail!("usage: slots <node> <rule>");
            };
            let node = state.session.resolve(reference)?;
            let rule: Rule = rule.parse()?;
            print!("{}", render::render_candidates(&state.session.candidates(node, rule)?));
        }
        "delete" => {
            let Some(reference) = args.first() else {
                bail!("usage: delete <node>");
            };
            let node = state.session.resolve(reference)?;
            let removed = state.session.delete(node)?;
            println!("removed {} node(s)", removed.len());
        }
        "check" => {
            let node = node_or_focus(state, args)?;
            let provable = state.runtime.block_on(state.session.check(node))?;
            if provable {
                println!("{}", "still provable".green());
            } else {
                println!("{}", "this goal can no longer be proved".yellow());
            }
        }
        "hint" => {
            let node = node_or_focus(state, args)?;
            let tipps = state.runtime.block_on(state.session.hint(node))?;
            if tipps.is_empty() {
                println!("no hint available");
            }
            for tipp in &tipps {
                println!("{}", render::render_tipp(tipp));
            }
        }
        "export" => {
            let typst = state.session.export()?;
            match args.first() {
                Some(path) => {
                    let path = PathBuf::from(path);
                    std::fs::write(&path, typst)?;
                    println!("wrote {}", path.display());
                }
                None => println!("{typst}"),
            }
        }
        "feedback" => {
            let feedback = parse_feedback(args)?;
            state.runtime.block_on(state.session.send_feedback(feedback))?;
            println!("{}", "thanks for the feedback".green());
        }
        other => bail!("unknown command `{other}` (try `help`)"),
    }

    Ok(ReplControl::Continue)
}

fn node_or_focus(state: &ReplState, args: &[String]) -> Result<ndtutor_core::NodeId> {
    match args.first() {
        Some(reference) => Ok(state.session.resolve(reference)?),
        None => Ok(state.session.tree().focus()),
    }
}

fn cmd_apply(state: &mut ReplState, args: &[String]) -> Result<()> {
    let [reference, rule, bindings @ ..] = args else {
        bail!("usage: apply <node> <rule> [binding ...]");
    };
    let node = state.session.resolve(reference)?;
    let rule: Rule = rule.parse()?;

    let completion = match state
        .runtime
        .block_on(state.session.apply(node, rule, bindings))
    {
        Err(SessionError::MissingBindings(candidates)) => {
            print!("{}", render::render_candidates(&candidates));
            return Err(SessionError::MissingBindings(candidates).into());
        }
        other => other?,
    };
    print!("{}", render::render_tree(state.session.tree(), state.session.tree().focus()));
    if let Some(Completion { ask_feedback }) = completion {
        println!("{}", "Proof complete!".green().bold());
        if ask_feedback {
            println!("Rate this exercise with `feedback like|dislike [difficulty 1-10]`.");
        }
    }
    Ok(())
}

/// `like|dislike [difficulty]`
pub(crate) fn parse_feedback(args: &[String]) -> Result<Feedback> {
    let like = match args.first().map(String::as_str) {
        Some("like" | "+") => true,
        Some("dislike" | "-") => false,
        _ => bail!("usage: feedback like|dislike [difficulty 1-10]"),
    };
    let difficulty = match args.get(1) {
        Some(raw) => {
            let value: u32 = raw
                .parse()
                .map_err(|_| anyhow!("difficulty must be a number, got `{raw}`"))?;
            if !(1..=10).contains(&value) {
                bail!("difficulty must be between 1 and 10");
            }
            Some(value)
        }
        None => None,
    };
    Ok(Feedback { like, difficulty })
}

/// Whitespace-separated words; double quotes group, backslash escapes.
pub(crate) fn split_command_line(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        out.push(current);
    }

    out
}

fn print_help() {
    println!("{}", "Commands".bold());
    println!("  show [node]                      print the tree below a node (default: focus)");
    println!("  goals                            list open goals");
    println!("  rules                            list derivation rules");
    println!("  focus <node> | root              move the view");
    println!("  apply <node> <rule> [binding..]  apply a rule; bindings fill the rule's");
    println!("                                   placeholders in order (quote formulas)");
    println!("  slots <node> <rule>              placeholders of a rule and bindings on offer");
    println!("  delete <node>                    undo the rule application above a node");
    println!("  check [node]                     ask whether a goal is still provable");
    println!("  hint [node]                      ask for a next step");
    println!("  export [file]                    Typst source of the whole proof");
    println!("  feedback like|dislike [1-10]     rate the exercise");
    println!("  exit                             leave the session");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{goal, rules, FakeBackend};
    use ndtutor_core::Formula;
    use ndtutor_storage::{LocalStore, StoreConfig};
    use std::sync::Arc;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn state() -> (ReplState, Arc<LocalStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::open(StoreConfig::new(dir.path())).unwrap());
        let session = Session::new(
            Uuid::new_v4(),
            goal(),
            rules(),
            Arc::new(FakeBackend::default()),
            store.clone(),
        );
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        (ReplState::new(session, runtime), store, dir)
    }

    fn run_line(state: &mut ReplState, line: &str) -> Result<ReplControl> {
        dispatch_repl_line_result(state, &split_command_line(line))
    }

    #[test]
    fn split_command_line_groups_quotes() {
        assert_eq!(
            split_command_line(r#"apply root AndIntro "A ∧ B" C"#),
            vec!["apply", "root", "AndIntro", "A ∧ B", "C"]
        );
        assert_eq!(split_command_line(r"a\ b"), vec!["a b"]);
        assert!(split_command_line("   ").is_empty());
    }

    #[test]
    fn feedback_arguments() {
        let args = |s: &str| split_command_line(s);
        assert_eq!(
            parse_feedback(&args("like 4")).unwrap(),
            Feedback {
                like: true,
                difficulty: Some(4)
            }
        );
        assert!(!parse_feedback(&args("dislike")).unwrap().like);
        assert!(parse_feedback(&args("like 11")).is_err());
        assert!(parse_feedback(&args("meh")).is_err());
    }

    #[test]
    fn full_proof_through_commands() {
        let (mut state, store, _dir) = state();
        run_line(&mut state, "apply root AndIntro A true").unwrap();
        let kids = state.session.tree().root().premisses.clone();
        assert_eq!(kids.len(), 2);

        let first = render::short_id(kids[0]);
        let second = render::short_id(kids[1]);
        run_line(&mut state, &format!("apply {first} Ax A")).unwrap();
        run_line(&mut state, &format!("apply {second} ax true")).unwrap();

        assert!(state.session.tree().is_root_complete());
        assert!(store.is_completed(state.session.exercise()).unwrap());

        run_line(&mut state, "feedback like 3").unwrap();
        assert!(store.has_feedback(state.session.exercise()).unwrap());
    }

    #[test]
    fn errors_do_not_end_the_session() {
        let (mut state, _store, _dir) = state();
        assert!(run_line(&mut state, "frobnicate").is_err());
        assert!(run_line(&mut state, "apply root NoSuchRule").is_err());
        assert!(run_line(&mut state, "delete root").is_err());
        assert!(run_line(&mut state, "focus ffffffff").is_err());
        assert_eq!(run_line(&mut state, "show").unwrap(), ReplControl::Continue);
        assert_eq!(run_line(&mut state, "quit").unwrap(), ReplControl::Exit);
    }

    #[test]
    fn missing_bindings_are_reported_with_candidates() {
        let (mut state, _store, _dir) = state();
        assert_eq!(run_line(&mut state, "slots root AndIntro").unwrap(), ReplControl::Continue);
        assert!(run_line(&mut state, "slots root").is_err());

        let err = run_line(&mut state, "apply root AndIntro A").unwrap_err();
        match err.downcast_ref::<SessionError>() {
            Some(SessionError::MissingBindings(candidates)) => {
                assert_eq!(candidates.slots, vec!["B"]);
                assert!(candidates.formulas.contains(&Formula::letter("A")));
            }
            other => panic!("expected missing bindings, got {other:?}"),
        }
        assert_eq!(err.to_string(), "AndIntro still needs a binding for B");
        assert!(state.session.tree().root().is_open());
    }

    #[test]
    fn export_writes_file() {
        let (mut state, _store, dir) = state();
        let path = dir.path().join("proof.typ");
        run_line(&mut state, &format!("export {}", path.display())).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("#import \"@preview/curryst:0.5.0\""));
    }
}
