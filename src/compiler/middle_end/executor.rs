//! The statement execution engine.
//!
//! The executor walks a statement array with an explicit cursor. It owns
//! the selector stack (who a command runs as), the file stack (where it is
//! written), the prefix accumulator and the unreachable-code countdown.
//! Loop bodies, macro bodies and included files run as subsections: the
//! same loop over a different array, with the outer array and cursor
//! restored afterwards.

use crate::compiler::backend::{Asset, AssetKind, CommandFile, Project};
use crate::compiler::middle_end::function::Function;
use crate::compiler::middle_end::preprocessor::Preprocessor;
use crate::compiler::middle_end::scoreboard::ScoreboardManager;
use crate::compiler::middle_end::session::{CompilerSession, Feature};
use crate::compiler::middle_end::statement::{self, Statement, StatementKind};
use crate::core::constants::*;
use crate::core::{Selector, Token, Value};
use crate::error::{CompilerError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Attach the statement being executed to any displayable error.
pub trait OrFail<T> {
    fn or_fail(self, executor: &Executor<'_>) -> Result<T>;
}

impl<T, E: fmt::Display> OrFail<T> for std::result::Result<T, E> {
    fn or_fail(self, executor: &Executor<'_>) -> Result<T> {
        self.map_err(|e| executor.fail(e.to_string()))
    }
}

/// Stack effect applied when a block opens or closes.
#[derive(Debug, Clone)]
pub enum BlockAction {
    PushSelector(Selector),
    PopSelector,
    PushFile(CommandFile),
    PopFile,
}

/// What the next open block does. `skip` jumps over the whole body.
#[derive(Debug, Clone, Default)]
pub struct BlockHooks {
    pub open: Vec<BlockAction>,
    pub close: Vec<BlockAction>,
    pub skip: bool,
}

impl BlockHooks {
    pub fn skip() -> Self {
        Self { skip: true, ..Default::default() }
    }
}

pub struct Executor<'s> {
    pub(crate) session: &'s mut CompilerSession,
    pub preprocessor: Preprocessor,
    pub scoreboard: ScoreboardManager,
    pub functions: Vec<Function>,
    pub project: Project,

    statements: Rc<[Statement]>,
    index: usize,
    selectors: Vec<Selector>,
    files: Vec<CommandFile>,
    head: Vec<String>,
    prefix: String,
    /// -1 when disabled, otherwise statements left before code is unreachable.
    unreachable: i32,
    /// Countdowns of scheduled selector pops, innermost last.
    pending_pops: Vec<u32>,
    pending_block: Option<BlockHooks>,
    open_blocks: Vec<Vec<BlockAction>>,
    last_conditions: HashMap<usize, Vec<Token>>,
    last_preprocessor_if: HashMap<usize, bool>,
    null_classes: Vec<String>,

    line: usize,
    source: String,
    pub(crate) base_directory: PathBuf,
    pub(crate) include_directories: Vec<PathBuf>,
    pub(crate) include_depth: usize,
}

impl AsMut<Preprocessor> for Executor<'_> {
    fn as_mut(&mut self) -> &mut Preprocessor {
        &mut self.preprocessor
    }
}

impl<'s> Executor<'s> {
    pub fn new(session: &'s mut CompilerSession, project_name: &str) -> Self {
        let mut preprocessor = Preprocessor::new();
        preprocessor.set("minecraftversion", vec![Value::Text(DEFAULT_MINECRAFT_VERSION.to_string())]);
        preprocessor.set("compilerversion", vec![Value::Text(MCC_VERSION.to_string())]);
        preprocessor.set("_true", vec![Value::Text("true".to_string())]);
        preprocessor.set("_false", vec![Value::Text("false".to_string())]);

        Self {
            session,
            preprocessor,
            scoreboard: ScoreboardManager::new(),
            functions: Vec::new(),
            project: Project::new(project_name),
            statements: Rc::from(Vec::new()),
            index: 0,
            selectors: vec![Selector::self_selector()],
            files: vec![CommandFile::new(project_name)],
            head: Vec::new(),
            prefix: String::new(),
            unreachable: -1,
            pending_pops: Vec::new(),
            pending_block: None,
            open_blocks: Vec::new(),
            last_conditions: HashMap::new(),
            last_preprocessor_if: HashMap::new(),
            null_classes: Vec::new(),
            line: 0,
            source: String::new(),
            base_directory: PathBuf::from("."),
            include_directories: Vec::new(),
            include_depth: 0,
        }
    }

    pub fn with_base_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.base_directory = directory.into();
        self
    }

    pub fn with_include_directories(mut self, directories: Vec<PathBuf>) -> Self {
        self.include_directories = directories;
        self
    }

    pub fn set_target_version(&mut self, version: &str) {
        self.preprocessor
            .set("minecraftversion", vec![Value::Text(version.to_string())]);
    }

    /// Error pointing at the statement currently executing.
    pub fn fail(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::statement(self.line, self.source.clone(), message)
    }

    /// Run `statements` as the top-level program and hand back the project.
    pub fn execute(mut self, statements: Vec<Statement>) -> Result<Project> {
        log::info!("Executing {} statements for '{}'", statements.len(), self.project.name);
        self.statements = Rc::from(statements);
        self.index = 0;
        self.run_loop()?;

        // a block left open at end of input leaves its files on the stack
        while self.files.len() > 1 {
            self.pop_file();
        }
        let mut root = self
            .files
            .pop()
            .ok_or_else(|| CompilerError::InvalidFormat { message: "Root file missing.".into() })?;
        let mut head = self.scoreboard.take_pending_head();
        head.append(&mut self.head);
        root.add_top(head);
        self.project.files.insert(0, root);
        if self.session.has_feature(Feature::Nulls) {
            self.project.add_asset(Asset {
                kind: AssetKind::Entity,
                name: "null".to_string(),
                content: null_entity(&self.null_classes),
            });
        }
        Ok(self.project)
    }

    fn run_loop(&mut self) -> Result<()> {
        while self.index < self.statements.len() {
            let statements = Rc::clone(&self.statements);
            let statement = &statements[self.index];
            self.index += 1;
            self.line = statement.line;
            self.source = statement.source.clone();
            log::debug!("compile line {}: {} [{}]", statement.line, statement.source, statement.describe());

            self.scoreboard.push_temp_state();
            let result = self.run_statement(statement);
            self.scoreboard.pop_temp_state();
            result?;

            self.check_unreachable()?;
            self.tick_pending_pops();
        }
        Ok(())
    }

    fn run_statement(&mut self, statement: &Statement) -> Result<()> {
        match &statement.kind {
            StatementKind::OpenBlock { statements_inside } => {
                self.open_block(*statements_inside);
                Ok(())
            }
            StatementKind::CloseBlock => self.close_block(),
            StatementKind::Unknown => Err(CompilerError::tokenizer(
                self.project.name.clone(),
                statement.line,
                format!("Unknown statement '{}'.", statement.source),
            )),
            StatementKind::Directive(directive) => {
                if let Some(feature) = directive.feature {
                    self.require_feature(feature)?;
                }
                let mut cursor = statement::prepare(self, statement)?;
                if !directive.patterns.is_empty()
                    && !directive.patterns.iter().any(|p| cursor.matches_pattern(p))
                {
                    return Err(cursor.error(
                        "Invalid call pattern. Make sure you included all arguments of the right type.",
                    ));
                }
                (directive.run)(self, &mut cursor)
            }
            StatementKind::Operation => {
                let mut cursor = statement::prepare(self, statement)?;
                statement::run_operation(self, &mut cursor)
            }
            StatementKind::FunctionCall => {
                let mut cursor = statement::prepare(self, statement)?;
                statement::run_call(self, &mut cursor)
            }
        }
    }

    /// Run `statements` in place of the current array, then resume.
    pub fn execute_subsection(&mut self, statements: Rc<[Statement]>) -> Result<()> {
        let saved_statements = std::mem::replace(&mut self.statements, statements);
        let saved_index = std::mem::replace(&mut self.index, 0);
        let saved_line = self.line;
        let saved_source = self.source.clone();

        self.scoreboard.push_temp_state();
        let result = self.run_loop();
        self.scoreboard.pop_temp_state();

        self.statements = saved_statements;
        self.index = saved_index;
        self.line = saved_line;
        self.source = saved_source;
        result
    }

    fn check_unreachable(&mut self) -> Result<()> {
        if self.unreachable > 0 {
            self.unreachable -= 1;
        } else if self.unreachable == 0 {
            return Err(self.fail("Unreachable code detected."));
        }
        Ok(())
    }

    /// Mark everything after the current statement in this block as dead.
    pub fn mark_unreachable(&mut self) {
        self.unreachable = 1;
    }

    fn tick_pending_pops(&mut self) {
        let Some(last) = self.pending_pops.last_mut() else { return };
        *last = last.saturating_sub(1);
        while self.pending_pops.last() == Some(&0) {
            self.pending_pops.pop();
            self.pop_selector();
            // a filter the statement never consumed must not leak past it
            self.prefix.clear();
            // a halt under a single-statement condition only ends that branch
            self.unreachable = -1;
            // the statement that completed also finishes the enclosing one
            if let Some(outer) = self.pending_pops.last_mut() {
                *outer = outer.saturating_sub(1);
            }
        }
    }

    /// Pop the active selector once the next statement has run.
    pub fn pop_selector_after_next(&mut self) {
        self.pending_pops.push(2);
    }

    // ----- blocks -----

    pub fn set_block_hooks(&mut self, hooks: BlockHooks) {
        self.pending_block = Some(hooks);
    }

    fn open_block(&mut self, statements_inside: usize) {
        let hooks = self.pending_block.take().unwrap_or_default();
        if hooks.skip {
            self.index += statements_inside;
        } else {
            for action in hooks.open {
                self.apply_block_action(action);
            }
        }
        self.open_blocks.push(hooks.close);
        self.unreachable = -1;
    }

    fn close_block(&mut self) -> Result<()> {
        let actions = self
            .open_blocks
            .pop()
            .ok_or_else(|| self.fail("Unexpected closing bracket."))?;
        for action in actions {
            self.apply_block_action(action);
        }
        self.unreachable = -1;
        Ok(())
    }

    /// Step over the next open-block statement without running its hooks,
    /// so its body runs as plain statements in the current scope.
    pub fn skip_open_block(&mut self) {
        if self.peek_next().map_or(false, Statement::is_open_block) {
            self.index += 1;
            self.open_blocks.push(Vec::new());
        }
    }

    fn apply_block_action(&mut self, action: BlockAction) {
        match action {
            BlockAction::PushSelector(selector) => self.selectors.push(selector),
            BlockAction::PopSelector => self.pop_selector(),
            BlockAction::PushFile(file) => self.push_file(file),
            BlockAction::PopFile => self.pop_file(),
        }
    }

    /// Nesting depth used to key per-scope `if`/`else` memory.
    pub fn scope_level(&self) -> usize {
        self.open_blocks.len()
    }

    pub fn set_last_condition(&mut self, tokens: Vec<Token>) {
        self.last_conditions.insert(self.scope_level(), tokens);
    }

    pub fn last_condition(&self) -> Option<&Vec<Token>> {
        self.last_conditions.get(&self.scope_level())
    }

    pub fn set_last_preprocessor_if(&mut self, result: bool) {
        self.last_preprocessor_if.insert(self.scope_level(), result);
    }

    pub fn last_preprocessor_if(&self) -> Option<bool> {
        self.last_preprocessor_if.get(&self.scope_level()).copied()
    }

    // ----- statement cursor -----

    pub fn has_next(&self) -> bool {
        self.index < self.statements.len()
    }

    pub fn peek_next(&self) -> Option<&Statement> {
        self.statements.get(self.index)
    }

    pub fn next_is_block(&self) -> bool {
        self.peek_next().map_or(false, Statement::is_open_block)
    }

    /// The statements the next directive body consists of: a whole block's
    /// contents, or the single next statement. The cursor moves past them.
    pub fn next_execution_set(&mut self) -> Result<Rc<[Statement]>> {
        let Some(next) = self.peek_next() else {
            return Err(self.fail("No valid statements inside block."));
        };
        match next.statements_inside() {
            Some(0) => Err(self.fail("No valid statements inside block.")),
            Some(inside) => {
                let start = self.index + 1;
                let set: Rc<[Statement]> = Rc::from(&self.statements[start..start + inside]);
                // open + body + close
                self.index = start + inside + 1;
                Ok(set)
            }
            None => {
                let set: Rc<[Statement]> = Rc::from(&self.statements[self.index..self.index + 1]);
                self.index += 1;
                Ok(set)
            }
        }
    }

    /// Take the next statement as raw, unresolved tokens.
    pub fn next_raw_statement(&mut self) -> Option<Statement> {
        let statement = self.statements.get(self.index).cloned();
        if statement.is_some() {
            self.index += 1;
        }
        statement
    }

    // ----- selectors -----

    pub fn active_selector(&self) -> &Selector {
        // never empty: the root entry is never popped
        &self.selectors[self.selectors.len() - 1]
    }

    pub fn set_active_selector(&mut self, selector: Selector) {
        let last = self.selectors.len() - 1;
        self.selectors[last] = selector;
    }

    /// Push a copy of the active selector, or `@s` when `reset` is set.
    pub fn push_selector(&mut self, reset: bool) {
        let selector = if reset {
            Selector::self_selector()
        } else {
            self.active_selector().clone()
        };
        self.selectors.push(selector);
    }

    /// Push a selector usable as `@s`, adding an alignment prefix first when
    /// the active selector cannot be addressed directly.
    pub fn push_selector_execute(&mut self) {
        let active = self.active_selector().clone();
        if active.needs_align() {
            self.prefix.push_str(&active.as_prefix());
            self.selectors.push(Selector::self_selector());
        } else {
            self.selectors.push(active);
        }
    }

    pub fn pop_selector(&mut self) {
        if self.selectors.len() > 1 {
            self.selectors.pop();
        }
    }

    // ----- files -----

    pub fn push_file(&mut self, file: CommandFile) {
        log::trace!("Entering file '{}'", file.path());
        self.files.push(file);
    }

    /// Finish the active file and hand it to the project.
    pub fn pop_file(&mut self) {
        if self.files.len() > 1 {
            if let Some(file) = self.files.pop() {
                self.project.add_file(file);
            }
        }
        self.unreachable = -1;
    }

    pub fn current_file(&mut self) -> &mut CommandFile {
        let last = self.files.len() - 1;
        &mut self.files[last]
    }

    /// Index of the user function whose body is being compiled.
    pub fn current_function(&self) -> Option<usize> {
        self.files.iter().rev().find_map(|f| f.function)
    }

    pub fn next_generated_file(&mut self, friendly: &str) -> CommandFile {
        CommandFile::in_folder(self.session.next_generated_name(friendly), GENERATED_FOLDER)
    }

    /// Emit a shared std file once per run and return the command calling it.
    pub fn std_file(&mut self, name: &str, commands: Vec<String>) -> String {
        let mut file = CommandFile::in_folder(name, GENERATED_FOLDER);
        let call = file.call();
        if self.session.claim_std_file(name) {
            file.extend(commands);
            self.project.add_file(file);
        }
        call
    }

    // ----- prefix and commands -----

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn append_prefix(&mut self, text: &str) {
        self.prefix.push_str(text);
    }

    pub fn prepend_prefix(&mut self, text: &str) {
        self.prefix.insert_str(0, text);
    }

    pub fn set_prefix(&mut self, text: impl Into<String>) {
        self.prefix = text.into();
    }

    /// Add one command, consuming the prefix.
    pub fn add_command(&mut self, command: impl AsRef<str>) {
        let prefix = std::mem::take(&mut self.prefix);
        let line = format!("{}{}", prefix, command.as_ref());
        self.current_file().add(line);
    }

    /// Add one command, leaving the prefix in place for the next.
    pub fn add_command_clean(&mut self, command: impl AsRef<str>) {
        let line = format!("{}{}", self.prefix, command.as_ref());
        self.current_file().add(line);
    }

    /// Queue a command for the top of the root file.
    pub fn add_command_head(&mut self, command: impl Into<String>) {
        self.head.push(command.into());
    }

    /// Add a batch of commands, consuming the prefix. Without a prefix, or
    /// when `inline` is set, every command is written in place; otherwise
    /// more than one command goes to a generated file named after
    /// `friendly`, called once from here.
    pub fn add_commands(&mut self, commands: Vec<String>, friendly: &str, inline: bool) {
        if commands.is_empty() {
            return;
        }
        if inline || self.prefix.is_empty() {
            let prefix = std::mem::take(&mut self.prefix);
            let file = self.current_file();
            for command in commands {
                file.add(format!("{}{}", prefix, command));
            }
            return;
        }
        if commands.len() == 1 {
            self.add_command(&commands[0]);
            return;
        }
        let mut file = self.next_generated_file(friendly);
        file.extend(commands);
        let call = file.call();
        self.project.add_file(file);
        self.add_command(call);
    }

    /// [`Self::add_commands`] without consuming the prefix.
    pub fn add_commands_clean(&mut self, commands: Vec<String>, friendly: &str) {
        if commands.is_empty() {
            return;
        }
        if self.prefix.is_empty() || commands.len() == 1 {
            for command in commands {
                self.add_command_clean(command);
            }
            return;
        }
        let mut file = self.next_generated_file(friendly);
        file.extend(commands);
        let call = file.call();
        self.project.add_file(file);
        self.add_command_clean(call);
    }

    // ----- functions -----

    pub fn find_function(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.matches(name))
    }

    // ----- features -----

    pub fn require_feature(&self, feature: Feature) -> Result<()> {
        if self.session.has_feature(feature) {
            return Ok(());
        }
        Err(self.fail(format!(
            "Feature not enabled: {}. Enable using the command 'feature {}' at the top of the file.",
            feature,
            feature.name()
        )))
    }

    /// Enable `feature`, running its one-time setup the first time.
    pub fn enable_feature(&mut self, feature: Feature) {
        if !self.session.enable_feature(feature) {
            return;
        }
        log::info!("Enabled feature {}", feature);
        match feature {
            Feature::Nulls => {
                self.preprocessor.set("null", vec![Value::Text(NULL_ENTITY.to_string())]);
            }
            Feature::Gametest => {
                log::warn!("gametest integration doesn't currently do anything.");
            }
            Feature::Exploders => {
                self.project.add_asset(Asset {
                    kind: AssetKind::Entity,
                    name: "exploder".to_string(),
                    content: exploder_entity(),
                });
            }
            Feature::Uninstall => {}
        }
    }

    /// Register a null class and return the event that applies it.
    pub fn define_null_class(&mut self, name: &str) -> String {
        let name = name.to_lowercase();
        if !self.null_classes.contains(&name) {
            self.null_classes.push(name.clone());
        }
        format!("{}{}", NULL_CLASS_PREFIX, name)
    }

    pub fn log_message(&mut self, message: String) {
        log::info!("[line {}] {}", self.line, message);
        self.project.log_messages.push(message);
    }
}

/// Invisible marker entity used by `null` and positional `damage`. Each
/// class is a component group adding a type family of the same name.
fn null_entity(classes: &[String]) -> serde_json::Value {
    let mut groups = serde_json::Map::new();
    let mut events = serde_json::Map::new();
    groups.insert("despawn".into(), json!({ "minecraft:instant_despawn": {} }));
    events.insert(NULL_EVENT_DESPAWN.into(), json!({ "add": { "component_groups": ["despawn"] } }));

    let class_groups: Vec<String> = classes.iter().map(|c| format!("class_{}", c)).collect();
    for (class, group) in classes.iter().zip(&class_groups) {
        groups.insert(group.clone(), json!({ "minecraft:type_family": { "family": ["null", class] } }));
        events.insert(
            format!("{}{}", NULL_CLASS_PREFIX, class),
            json!({ "add": { "component_groups": [group] } }),
        );
    }
    events.insert(NULL_EVENT_CLEAN.into(), json!({ "remove": { "component_groups": class_groups } }));

    json!({
        "format_version": "1.16.0",
        "minecraft:entity": {
            "description": {
                "identifier": NULL_ENTITY,
                "is_spawnable": false,
                "is_summonable": true,
                "is_experimental": false
            },
            "component_groups": groups,
            "components": {
                "minecraft:physics": { "has_gravity": false, "has_collision": false },
                "minecraft:collision_box": { "width": 0, "height": 0 },
                "minecraft:damage_sensor": { "triggers": { "deals_damage": false } }
            },
            "events": events
        }
    })
}

fn exploder_entity() -> serde_json::Value {
    json!({
        "format_version": "1.16.0",
        "minecraft:entity": {
            "description": {
                "identifier": "dummy:exploder",
                "is_spawnable": false,
                "is_summonable": true,
                "is_experimental": false
            },
            "components": {
                "minecraft:explode": { "fuse_length": 0, "fuse_lit": true, "power": 3, "causes_fire": false }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CompilerSession {
        CompilerSession::new().unwrap()
    }

    #[test]
    fn test_default_variables() {
        let mut session = session();
        let executor = Executor::new(&mut session, "main");
        assert_eq!(executor.preprocessor.get("_true").unwrap(), &[Value::Text("true".into())]);
        assert!(executor.preprocessor.contains("compilerversion"));
    }

    #[test]
    fn test_prefix_consumed_by_add_command() {
        let mut session = session();
        let mut executor = Executor::new(&mut session, "main");
        executor.append_prefix("execute @a ~ ~ ~ ");
        executor.add_command_clean("say one");
        executor.add_command("say two");
        executor.add_command("say three");
        assert_eq!(
            executor.current_file().commands,
            vec!["execute @a ~ ~ ~ say one", "execute @a ~ ~ ~ say two", "say three"]
        );
    }

    #[test]
    fn test_add_commands_branches_under_prefix() {
        let mut session = session();
        let mut executor = Executor::new(&mut session, "main");
        executor.add_commands(vec!["say a".into(), "say b".into()], "print", false);
        assert_eq!(executor.current_file().len(), 2);

        executor.append_prefix("execute @p ~ ~ ~ ");
        executor.add_commands(vec!["say a".into(), "say b".into()], "print", false);
        assert_eq!(executor.current_file().commands[2], "execute @p ~ ~ ~ function compiler/print0");
        assert!(executor.prefix().is_empty());
        assert!(executor.project.has_file("compiler/print0"));
    }

    #[test]
    fn test_push_selector_execute_aligns() {
        let mut session = session();
        let mut executor = Executor::new(&mut session, "main");
        executor.set_active_selector(Selector::parse("@a[tag=x]").unwrap());
        executor.push_selector_execute();
        assert_eq!(executor.prefix(), "execute @a[tag=x] ~ ~ ~ ");
        assert_eq!(executor.active_selector(), &Selector::self_selector());
        executor.pop_selector();
        assert_eq!(executor.active_selector().to_string(), "@a[tag=x]");
    }

    #[test]
    fn test_selector_stack_never_empties() {
        let mut session = session();
        let mut executor = Executor::new(&mut session, "main");
        executor.pop_selector();
        executor.pop_selector();
        assert_eq!(executor.active_selector(), &Selector::self_selector());
    }

    #[test]
    fn test_std_file_once() {
        let mut session = session();
        let mut executor = Executor::new(&mut session, "main");
        let first = executor.std_file(STD_HALT, vec!["say x".into()]);
        let second = executor.std_file(STD_HALT, vec!["say x".into()]);
        assert_eq!(first, second);
        assert_eq!(executor.project.files.len(), 1);
    }

    #[test]
    fn test_require_feature_message() {
        let mut session = session();
        let mut executor = Executor::new(&mut session, "main");
        let err = executor.require_feature(Feature::Nulls).unwrap_err();
        assert_eq!(
            err.message(),
            "Feature not enabled: NULLS. Enable using the command 'feature nulls' at the top of the file."
        );
        executor.enable_feature(Feature::Nulls);
        assert!(executor.require_feature(Feature::Nulls).is_ok());
        assert!(executor.preprocessor.contains("null"));
        assert_eq!(executor.define_null_class("Guard"), "dummy:class_guard");

        let project = executor.execute(Vec::new()).unwrap();
        assert_eq!(project.assets.len(), 1);
        let events = &project.assets[0].content["minecraft:entity"]["events"];
        assert!(events.get("dummy:class_guard").is_some());
    }
}
