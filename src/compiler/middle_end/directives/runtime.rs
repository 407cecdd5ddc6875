//! Directives that emit commands.

use crate::compiler::backend::{Asset, AssetKind, CommandFile};
use crate::compiler::middle_end::comparison::{self, next_name};
use crate::compiler::middle_end::executor::{BlockAction, BlockHooks, Executor, OrFail};
use crate::compiler::middle_end::function::{assign_operand, Function, Parameter};
use crate::compiler::middle_end::rawtext;
use crate::compiler::middle_end::scoreboard::{CounterKind, ScoreboardValue, StructDefinition};
use crate::compiler::middle_end::session::Feature;
use crate::compiler::middle_end::statement::{parse_kind, Cursor, StatementKind, SELF_TARGET};
use crate::core::command;
use crate::core::constants::*;
use crate::core::selector::Core;
use crate::core::token::{Ident, Operand};
use crate::core::{Coord, Selector, TokenKind};
use crate::error::Result;
use serde_json::json;

fn next_position(cursor: &mut Cursor) -> Result<(Coord, Coord, Coord)> {
    Ok((cursor.next_as::<Coord>()?, cursor.next_as::<Coord>()?, cursor.next_as::<Coord>()?))
}

/// Up to three coordinates, `~` for any left out.
fn optional_position(cursor: &mut Cursor) -> (Coord, Coord, Coord) {
    let x = cursor.try_next::<Coord>().unwrap_or(Coord::HERE);
    let y = cursor.try_next::<Coord>().unwrap_or(Coord::HERE);
    let z = cursor.try_next::<Coord>().unwrap_or(Coord::HERE);
    (x, y, z)
}

fn null_selector(name: &str) -> String {
    format!("@e[type={},name=\"{}\"]", NULL_ENTITY, name)
}

/// Leading handling mode for `block` and `fill`. A mode is only present when
/// a bare word is followed by the block name.
fn handling_mode(cursor: &mut Cursor, modes: &[&str]) -> Result<String> {
    let present = match cursor.remaining() {
        [first, second, ..] => {
            matches!(first.kind, TokenKind::Identifier(_)) && (second.is::<String>() || second.is::<Ident>())
        }
        _ => false,
    };
    if !present {
        return Ok("replace".to_string());
    }
    let Ident(word) = cursor.next_as::<Ident>()?;
    let lower = word.to_lowercase();
    if !modes.contains(&lower.as_str()) {
        return Err(cursor.error(format!(
            "Invalid block handling mode '{}'. Valid options are {}.",
            word,
            modes.join(", ")
        )));
    }
    Ok(lower)
}

/// Run `commands` as `@s`, aligned to the active selector first.
fn as_selected(executor: &mut Executor<'_>, commands: Vec<String>, friendly: &str) {
    executor.push_selector_execute();
    executor.add_commands(commands, friendly, false);
    executor.pop_selector();
}

pub fn mc(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let command = cursor.next_as::<String>()?;
    executor.add_command(command);
    Ok(())
}

pub fn select(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let selector = cursor.next_as::<Selector>()?;
    if executor.next_is_block() {
        executor.set_block_hooks(BlockHooks {
            open: vec![BlockAction::PushSelector(selector)],
            close: vec![BlockAction::PopSelector],
            skip: false,
        });
    } else {
        executor.set_active_selector(selector);
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Display {
    Chat,
    Title(&'static str),
}

impl Display {
    fn command(self, target: &str, json: &str) -> String {
        match self {
            Display::Chat => command::tellraw(target, json),
            Display::Title(kind) => command::titleraw(target, kind, json),
        }
    }

    fn friendly(self) -> &'static str {
        match self {
            Display::Chat => "print",
            Display::Title(_) => "title",
        }
    }
}

fn show_text(executor: &mut Executor<'_>, text: &str, display: Display, global: bool) -> Result<()> {
    let formatted = rawtext::format(&executor.session.fstring_pattern, text, &executor.scoreboard, SELF_TARGET);
    let json = formatted.to_rawtext();

    if !formatted.advanced {
        let target = if global { "@a".to_string() } else { executor.active_selector().target() };
        executor.add_command(display.command(&target, &json));
        return Ok(());
    }

    // scores are read from each receiving player
    let mut commands = formatted.setup;
    commands.push(display.command(SELF_TARGET, &json));
    if global {
        executor.append_prefix(&Selector::new(Core::A).as_prefix());
        executor.add_commands(commands, display.friendly(), false);
    } else {
        as_selected(executor, commands, display.friendly());
    }
    Ok(())
}

pub fn globalprint(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let text = cursor.next_as::<String>()?;
    show_text(executor, &text, Display::Chat, true)
}

pub fn print(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let text = cursor.next_as::<String>()?;
    show_text(executor, &text, Display::Chat, false)
}

fn title_like(executor: &mut Executor<'_>, cursor: &mut Cursor, global: bool, actionbar: bool) -> Result<()> {
    let kind = if actionbar { "actionbar" } else { "title" };
    if let Some(Ident(word)) = cursor.try_next::<Ident>() {
        let target = if global { "@a".to_string() } else { executor.active_selector().target() };
        match word.to_lowercase().as_str() {
            "times" => {
                let fade_in = cursor.next_as::<i32>()?;
                let stay = cursor.next_as::<i32>()?;
                let fade_out = cursor.next_as::<i32>()?;
                executor.add_command(command::title_times(&target, fade_in, stay, fade_out));
                return Ok(());
            }
            "subtitle" if !actionbar => {
                let text = cursor.next_as::<String>()?;
                return show_text(executor, &text, Display::Title("subtitle"), global);
            }
            _ if actionbar => {
                return Err(cursor.error(format!("Invalid actionbar subcommand '{}'. Must be 'times'.", word)));
            }
            _ => {
                return Err(cursor.error(format!(
                    "Invalid title subcommand '{}'. Must be 'times' or 'subtitle'.",
                    word
                )));
            }
        }
    }
    let text = cursor.next_as::<String>()?;
    show_text(executor, &text, Display::Title(kind), global)
}

pub fn globaltitle(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    title_like(executor, cursor, true, false)
}

pub fn title(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    title_like(executor, cursor, false, false)
}

pub fn globalactionbar(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    title_like(executor, cursor, true, true)
}

pub fn actionbar(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    title_like(executor, cursor, false, true)
}

/// `[type] name [= default]`, shared by `define` and function parameters.
struct Definition {
    value: ScoreboardValue,
    default: Option<Operand>,
}

fn parse_definition(executor: &Executor<'_>, cursor: &mut Cursor) -> Result<Definition> {
    let kind = parse_kind(executor, cursor)?.unwrap_or(CounterKind::Int);
    let Ident(name) = cursor.next_as::<Ident>()?;
    let default = if cursor.next_kind_is(&TokenKind::Assign(None)) {
        cursor.next()?;
        Some(cursor.next_as::<Operand>()?)
    } else {
        None
    };
    Ok(Definition { value: ScoreboardValue::new(name, kind), default })
}

pub fn define(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let Definition { value, default } = parse_definition(executor, cursor)?;
    executor.scoreboard.define(value.clone()).or_fail(executor)?;

    let mut commands = value.define();
    let friendly = format!("define{}", value.name);
    let Some(default) = default else {
        executor.add_commands(commands, &friendly, false);
        return Ok(());
    };

    executor.push_selector_execute();
    let assigned = match &default {
        Operand::Literal(literal) => Ok(value.set_literal(SELF_TARGET, literal)),
        operand => assign_operand(&mut executor.scoreboard, SELF_TARGET, &value, operand),
    };
    match assigned {
        Ok(assigned) => {
            commands.extend(assigned);
            executor.add_commands(commands, &friendly, false);
            executor.pop_selector();
            Ok(())
        }
        Err(e) => {
            executor.pop_selector();
            Err(executor.fail(e.to_string()))
        }
    }
}

pub fn init(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let mut commands = Vec::new();
    while cursor.has_next() {
        let name = next_name(cursor)?;
        let value = executor
            .scoreboard
            .get(&name)
            .ok_or_else(|| cursor.error(format!("Attempted to initialize undefined variable '{}'.", name)))?;
        commands.extend(value.init());
    }
    executor.add_commands(commands, "init", true);
    Ok(())
}

pub fn if_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    executor.set_last_condition(cursor.remaining().to_vec());
    // the condition may be replayed by `else` after the body
    executor.scoreboard.keep_temps();
    if !executor.has_next() {
        return Err(cursor.error("Unexpected end-of-file after if/else statement."));
    }
    let chain = comparison::parse_chain(executor, cursor)?;
    comparison::run_chain(executor, &chain)
}

pub fn else_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let tokens = executor
        .last_condition()
        .cloned()
        .ok_or_else(|| cursor.error("No if statement before this else."))?;
    if !executor.has_next() {
        return Err(cursor.error("Unexpected end-of-file after if/else statement."));
    }
    let mut replay = cursor.replay(tokens);
    let chain = comparison::parse_chain(executor, &mut replay)?;
    comparison::run_inverted_chain(executor, &chain)
}

pub fn give(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let item = next_name(cursor)?;
    let count = cursor.try_next::<i32>().unwrap_or(1);
    let data = cursor.try_next::<i32>().unwrap_or(0);

    let mut components = serde_json::Map::new();
    let mut can_place_on = Vec::new();
    let mut can_destroy = Vec::new();
    while let Some(Ident(word)) = cursor.try_next::<Ident>() {
        match word.to_lowercase().as_str() {
            "keep" => {
                components.insert("minecraft:keep_on_death".into(), json!({}));
            }
            "lockinventory" => {
                components.insert("minecraft:item_lock".into(), json!({ "mode": "lock_in_inventory" }));
            }
            "lockslot" => {
                components.insert("minecraft:item_lock".into(), json!({ "mode": "lock_in_slot" }));
            }
            "canplaceon" => can_place_on.push(next_name(cursor)?),
            "candestroy" => can_destroy.push(next_name(cursor)?),
            "enchant" | "name" | "lore" | "title" | "author" | "page" | "dye" => {
                return Err(cursor.error(format!(
                    "Item attribute '{}' needs a generated structure, which this compiler does not produce.",
                    word
                )));
            }
            _ => return Err(cursor.error(format!("Unknown give attribute '{}'.", word))),
        }
    }
    if !can_place_on.is_empty() {
        components.insert("minecraft:can_place_on".into(), json!({ "blocks": can_place_on }));
    }
    if !can_destroy.is_empty() {
        components.insert("minecraft:can_destroy".into(), json!({ "blocks": can_destroy }));
    }

    let target = executor.active_selector().target();
    let mut give = command::give(&target, &item, count, data);
    if !components.is_empty() {
        give.push(' ');
        give.push_str(&serde_json::Value::Object(components).to_string());
    }
    executor.add_command(give);
    Ok(())
}

pub fn tp(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let command = if let Some(destination) = cursor.try_next::<Selector>() {
        command::teleport_to(SELF_TARGET, &destination.target())
    } else {
        let (x, y, z) = next_position(cursor)?;
        match cursor.try_next::<Coord>() {
            Some(ry) => {
                let rx = cursor.try_next::<Coord>().unwrap_or(Coord::HERE);
                command::teleport_rotated(SELF_TARGET, x, y, z, ry, rx)
            }
            None => command::teleport(SELF_TARGET, x, y, z),
        }
    };
    executor.push_selector_execute();
    executor.add_command(command);
    executor.pop_selector();
    Ok(())
}

pub fn tphere(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let selector = cursor.next_as::<Selector>()?;
    let (x, y, z) = optional_position(cursor);
    executor.push_selector_execute();
    executor.add_command(command::teleport(&selector.target(), x, y, z));
    executor.pop_selector();
    Ok(())
}

pub fn move_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let Ident(direction) = cursor.next_as::<Ident>()?;
    let amount = cursor.next_as::<f32>()?;
    let (mut x, mut y, mut z) = (Coord::FACING_HERE, Coord::FACING_HERE, Coord::FACING_HERE);
    match direction.to_lowercase().as_str() {
        "left" => x = Coord::facing(amount),
        "right" => x = Coord::facing(-amount),
        "up" => y = Coord::facing(amount),
        "down" => y = Coord::facing(-amount),
        "forward" | "forwards" => z = Coord::facing(amount),
        "backward" | "backwards" => z = Coord::facing(-amount),
        _ => {
            return Err(cursor.error(format!(
                "Invalid direction '{}'. Valid options are LEFT, RIGHT, UP, DOWN, FORWARD, BACKWARD.",
                direction
            )));
        }
    }
    executor.push_selector_execute();
    executor.add_command(command::teleport(SELF_TARGET, x, y, z));
    executor.pop_selector();
    Ok(())
}

pub fn face(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let here = Coord::HERE;
    let command = match cursor.try_next::<Selector>() {
        Some(mut other) => {
            if other.selects_multiple() {
                other.count = Some(1);
            }
            command::teleport_facing_entity(SELF_TARGET, here, here, here, &other.target())
        }
        None => {
            let (x, y, z) = next_position(cursor)?;
            command::teleport_facing(SELF_TARGET, here, here, here, x, y, z)
        }
    };
    executor.push_selector_execute();
    executor.add_command(command);
    executor.pop_selector();
    Ok(())
}

pub fn facehere(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let selector = cursor.next_as::<Selector>()?;
    let here = Coord::HERE;
    let marker = format!("@e[tag={},c=1]", HERE_TAG);
    let commands = vec![
        command::tag_add(SELF_TARGET, HERE_TAG),
        command::execute(
            &selector.target(),
            here,
            here,
            here,
            &command::teleport_facing_entity(SELF_TARGET, here, here, here, &marker),
        ),
        command::tag_remove(SELF_TARGET, HERE_TAG),
    ];
    as_selected(executor, commands, "facehere");
    Ok(())
}

pub fn rotate(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let ry = Coord::relative(cursor.next_as::<f32>()?);
    let rx = cursor.try_next::<f32>().map(Coord::relative).unwrap_or(Coord::HERE);
    let here = Coord::HERE;
    executor.push_selector_execute();
    executor.add_command(command::teleport_rotated(SELF_TARGET, here, here, here, ry, rx));
    executor.pop_selector();
    Ok(())
}

pub fn block(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let mode = handling_mode(cursor, &["replace", "keep", "destroy"])?;
    let block = next_name(cursor)?;
    let (x, y, z) = next_position(cursor)?;
    let data = cursor.try_next::<i32>().unwrap_or(0);
    executor.push_selector_execute();
    executor.add_command(command::setblock(x, y, z, &block, data, &mode));
    executor.pop_selector();
    Ok(())
}

pub fn fill(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let mode = handling_mode(cursor, &["replace", "keep", "destroy", "hollow", "outline"])?;
    let block = next_name(cursor)?;
    let from = next_position(cursor)?;
    let to = next_position(cursor)?;
    let data = cursor.try_next::<i32>().unwrap_or(0);
    executor.push_selector_execute();
    executor.add_command(command::fill(from, to, &block, data, &mode));
    executor.pop_selector();
    Ok(())
}

pub fn scatter(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let block = next_name(cursor)?;
    let percent = cursor.next_as::<i32>()?;
    let (x1, y1, z1) = next_position(cursor)?;
    let (x2, y2, z2) = next_position(cursor)?;
    if !Coord::size_known(&[(x1, x2), (y1, y2), (z1, z2)]) {
        return Err(cursor.error(
            "Scatter command requires all coordinate arguments to be relative or exact. (the size needs to be known at compile time.)",
        ));
    }
    let seed = cursor.try_next::<String>();

    let size = [
        (x2.value_int() - x1.value_int()).abs() + 1,
        (y2.value_int() - y1.value_int()).abs() + 1,
        (z2.value_int() - z1.value_int()).abs() + 1,
    ];
    let (max_x, max_y, max_z) = MAX_SCATTER_SIZE;
    if size[0] > max_x || size[1] > max_y || size[2] > max_z {
        return Err(cursor.error(format!(
            "Scatter zone size cannot be larger than {}x{}x{}.",
            max_x, max_y, max_z
        )));
    }

    let name = format!("scatter_{}", executor.session.next_scatter_index());
    executor.project.add_asset(Asset {
        kind: AssetKind::Structure,
        name: name.clone(),
        content: json!({
            "format_version": 1,
            "size": size,
            "structure_world_origin": [0, 0, 0],
            "palette": [block],
        }),
    });

    let command = command::structure_load_integrity(
        &name,
        Coord::min(x1, x2),
        Coord::min(y1, y2),
        Coord::min(z1, z2),
        percent,
        seed.as_deref(),
    );
    executor.push_selector_execute();
    executor.add_command(command);
    executor.pop_selector();
    Ok(())
}

pub fn replace(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let source = next_name(cursor)?;
    let source_data = cursor.try_next::<i32>().unwrap_or(-1);
    let from = next_position(cursor)?;
    let to = next_position(cursor)?;
    let block = next_name(cursor)?;
    let data = cursor.try_next::<i32>().unwrap_or(-1);
    executor.push_selector_execute();
    executor.add_command(command::fill_replace(from, to, &block, data, &source, source_data));
    executor.pop_selector();
    Ok(())
}

pub fn kill(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let target = match cursor.try_next::<Selector>() {
        Some(selector) => selector.target(),
        None => executor.active_selector().target(),
    };
    executor.add_command(command::kill(&target));
    Ok(())
}

pub fn remove(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let here = Coord::HERE;
    let call = executor.std_file(
        STD_SILENT_REMOVE,
        vec![
            command::teleport(SELF_TARGET, here, Coord::relative(-9999.0), here),
            command::kill(SELF_TARGET),
        ],
    );
    match cursor.try_next::<Selector>() {
        Some(selector) => executor.add_command(command::execute(&selector.target(), here, here, here, &call)),
        None => {
            executor.push_selector_execute();
            executor.add_command(call);
            executor.pop_selector();
        }
    }
    Ok(())
}

pub fn say(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let text = cursor.next_as::<String>()?;
    executor.push_selector_execute();
    executor.add_command(command::say(&text));
    executor.pop_selector();
    Ok(())
}

pub fn halt(executor: &mut Executor<'_>, _cursor: &mut Cursor) -> Result<()> {
    let own_path = format!("{}/{}", GENERATED_FOLDER, STD_HALT);
    let call = executor.std_file(STD_HALT, vec![command::function(&own_path)]);
    executor.add_command(call);
    executor.mark_unreachable();
    Ok(())
}

pub fn damage(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let amount = cursor.next_as::<i32>()?;
    let cause = cursor
        .try_next::<Ident>()
        .map(|Ident(word)| word.to_lowercase())
        .unwrap_or_else(|| "all".to_string());
    let target = executor.active_selector().target();

    if let Some(mut blame) = cursor.try_next::<Selector>() {
        if blame.selects_multiple() {
            blame.count = Some(1);
        }
        executor.add_command(command::damage_by(&target, amount, &cause, &blame.target()));
        return Ok(());
    }
    if cursor.next_is::<Coord>() {
        let (x, y, z) = next_position(cursor)?;
        executor.require_feature(Feature::Nulls)?;
        let damager = null_selector(DAMAGER_ENTITY);
        let commands = vec![
            command::summon(NULL_ENTITY, x, y, z, Some("minecraft:entity_spawned"), Some(DAMAGER_ENTITY)),
            command::damage_by(&target, amount, &cause, &damager),
            command::event(&damager, NULL_EVENT_DESPAWN),
        ];
        executor.add_commands(commands, "damagefrom", false);
        return Ok(());
    }
    executor.add_command(command::damage(&target, amount, &cause));
    Ok(())
}

/// `summon` for a named null, applying its class when given.
fn create_null(executor: &mut Executor<'_>, name: &str, class: Option<&str>, position: (Coord, Coord, Coord)) -> String {
    let event = match class {
        Some(class) => executor.define_null_class(class),
        None => "minecraft:entity_spawned".to_string(),
    };
    let (x, y, z) = position;
    command::summon(NULL_ENTITY, x, y, z, Some(&event), Some(name))
}

pub fn null(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let Ident(word) = cursor.next_as::<Ident>()?;
    match word.to_uppercase().as_str() {
        "CREATE" => {
            let name = cursor.next_as::<String>()?;
            let class = cursor.try_next::<String>();
            let position = optional_position(cursor);
            let summon = create_null(executor, &name, class.as_deref(), position);
            executor.push_selector_execute();
            executor.add_command(summon);
            executor.pop_selector();
        }
        "SINGLE" => {
            let name = cursor.next_as::<String>()?;
            let class = cursor.try_next::<String>();
            let position = next_position(cursor)?;
            let commands = vec![
                command::event(&null_selector(&name), NULL_EVENT_DESPAWN),
                create_null(executor, &name, class.as_deref(), position),
            ];
            as_selected(executor, commands, "singletonnull");
        }
        "REMOVE" => {
            let all = cursor.next_word("all");
            let target = if all {
                format!("@e[type={}]", NULL_ENTITY)
            } else {
                executor.active_selector().target()
            };
            executor.add_command(command::event(&target, NULL_EVENT_DESPAWN));
        }
        "CLASS" => {
            let target = executor.active_selector().target();
            if cursor.next_word("remove") {
                executor.add_command(command::event(&target, NULL_EVENT_CLEAN));
                return Ok(());
            }
            let class = next_name(cursor)?;
            let event = executor.define_null_class(&class);
            let commands = vec![command::event(&target, NULL_EVENT_CLEAN), command::event(&target, &event)];
            executor.add_commands(commands, "nullclass", true);
        }
        _ => {
            return Err(cursor.error(format!(
                "Invalid mode for null command: {}. Valid options are CREATE, SINGLE, REMOVE, or CLASS",
                word
            )));
        }
    }
    Ok(())
}

pub fn tag(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let Ident(word) = cursor.next_as::<Ident>()?;
    let tag = next_name(cursor)?;
    let target = executor.active_selector().target();
    match word.to_uppercase().as_str() {
        "ADD" => executor.add_command(command::tag_add(&target, &tag)),
        "REMOVE" => executor.add_command(command::tag_remove(&target, &tag)),
        "SINGLE" => {
            let holders = format!("@e[tag={}]", tag);
            let commands = vec![command::tag_remove(&holders, &tag), command::tag_add(&target, &tag)];
            executor.add_commands(commands, "tagsingle", false);
        }
        _ => {
            return Err(cursor.error(format!(
                "Invalid mode for tag command: {}. Valid options are ADD, REMOVE, SINGLE",
                word
            )));
        }
    }
    Ok(())
}

pub fn limit(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let mut selector = executor.active_selector().clone();
    selector.count = cursor.try_next::<i32>();
    executor.set_active_selector(selector);
    Ok(())
}

pub fn feature(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let Ident(word) = cursor.next_as::<Ident>()?;
    let feature = Feature::parse(&word).ok_or_else(|| cursor.error("No valid feature specified."))?;
    executor.enable_feature(feature);
    Ok(())
}

pub fn function(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let selector = cursor.try_next::<Selector>().unwrap_or_else(Selector::self_selector);
    let Ident(name) = cursor.next_as::<Ident>()?;
    if cursor.next_kind_is(&TokenKind::OpenParen) {
        cursor.next()?;
    }

    let mut params = Vec::new();
    while cursor.next_is::<Ident>() {
        let Definition { value, default } = parse_definition(executor, cursor)?;
        if default.is_none() && params.iter().any(|p: &Parameter| p.default.is_some()) {
            return Err(cursor.error("All parameters following a parameter with a default must also have defaults."));
        }
        executor.scoreboard.define(value.clone()).or_fail(executor)?;
        executor.scoreboard.define_in_head(&value);
        params.push(Parameter { value, default });
    }
    if !executor.next_is_block() {
        return Err(cursor.error("No block following function definition."));
    }
    debug_assert!(Function::defaults_are_trailing(&params));

    let function = Function::new(name.as_str(), selector.clone(), params);
    let mut file = CommandFile::new(function.file.clone());
    let index = match executor.find_function(&name) {
        Some(existing) => {
            log::warn!("Function '{}' redefined", name);
            executor.functions[existing] = function;
            existing
        }
        None => {
            executor.functions.push(function);
            executor.functions.len() - 1
        }
    };
    file.function = Some(index);
    log::debug!("Defining function '{}'", name);

    executor.set_block_hooks(BlockHooks {
        open: vec![BlockAction::PushSelector(selector), BlockAction::PushFile(file)],
        close: vec![BlockAction::PopSelector, BlockAction::PopFile],
        skip: false,
    });
    Ok(())
}

pub fn return_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let index = executor
        .current_function()
        .ok_or_else(|| cursor.error("Cannot return a value outside of a function."))?;
    let operand = cursor.next_as::<Operand>()?;
    let kind = match &operand {
        Operand::Literal(literal) => CounterKind::for_literal(literal)
            .ok_or_else(|| cursor.error(format!("Cannot return a {} value.", literal.kind_name())))?,
        Operand::Counter(name) => executor.scoreboard.try_get(name).or_fail(executor)?.kind,
    };

    let (slot, fresh) = executor.functions[index]
        .return_slot(index, &kind)
        .ok_or_else(|| cursor.error("Every return in a function must return the same type."))?;
    if fresh {
        executor.scoreboard.define(slot.clone()).or_fail(executor)?;
        executor.scoreboard.define_in_head(&slot);
    }
    let commands = assign_operand(&mut executor.scoreboard, SELF_TARGET, &slot, &operand).or_fail(executor)?;
    executor.add_commands(commands, "return", false);
    Ok(())
}

pub fn struct_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let Ident(name) = cursor.next_as::<Ident>()?;
    if !executor.next_is_block() {
        return Err(cursor.error("No block after struct definition."));
    }
    let fields = executor
        .next_raw_statement()
        .and_then(|open| open.statements_inside())
        .unwrap_or(0);

    let mut definition = StructDefinition::new(name.as_str());
    for _ in 0..fields {
        let statement = executor
            .next_raw_statement()
            .ok_or_else(|| cursor.error("Unexpected end-of-file following struct definition."))?;
        let mut field = cursor.replay(statement.tokens);
        let kind = parse_kind(executor, &mut field)?.unwrap_or(CounterKind::Int);
        let Ident(field_name) = field.next_as::<Ident>()?;
        definition.add_field(field_name, kind);
    }

    match executor.next_raw_statement() {
        Some(close) if matches!(close.kind, StatementKind::CloseBlock) => {}
        _ => return Err(cursor.error("Unexpected end-of-file following struct definition.")),
    }
    log::debug!("Defined struct '{}'", name);
    executor.scoreboard.define_struct(definition);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::compiler::backend::Project;
    use crate::compiler::frontend::parse_source;
    use crate::compiler::middle_end::executor::Executor;
    use crate::compiler::middle_end::session::CompilerSession;
    use crate::core::constants::{COUNTING_TAG, TEMP_PREFIX};
    use crate::error::Result;
    use std::collections::HashMap;

    fn run(source: &str) -> Result<Project> {
        let mut session = CompilerSession::new()?;
        let statements = parse_source(source, "test")?;
        Executor::new(&mut session, "test").execute(statements)
    }

    fn root(source: &str) -> Vec<String> {
        run(source).unwrap().files[0].commands.clone()
    }

    /// Apply `@s` score commands to a score table, in order.
    fn replay(commands: &[String]) -> HashMap<String, i32> {
        let mut scores: HashMap<String, i32> = HashMap::new();
        for command in commands {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.as_slice() {
                ["scoreboard", "objectives", ..] => {}
                ["scoreboard", "players", "set", "@s", name, n] => {
                    scores.insert(name.to_string(), n.parse().unwrap());
                }
                ["scoreboard", "players", "add", "@s", name, n] => {
                    *scores.entry(name.to_string()).or_insert(0) += n.parse::<i32>().unwrap();
                }
                ["scoreboard", "players", "remove", "@s", name, n] => {
                    *scores.entry(name.to_string()).or_insert(0) -= n.parse::<i32>().unwrap();
                }
                ["scoreboard", "players", "operation", "@s", a, op, "@s", b] => {
                    let b = scores.get(*b).copied().unwrap_or(0);
                    let a = scores.entry(a.to_string()).or_insert(0);
                    match *op {
                        "=" => *a = b,
                        "+=" => *a += b,
                        "-=" => *a -= b,
                        "*=" => *a *= b,
                        "/=" => *a /= b,
                        "%=" => *a %= b,
                        other => panic!("Unexpected operation {}", other),
                    }
                }
                _ => panic!("Unexpected command: {}", command),
            }
        }
        scores
    }

    fn branch_files(project: &Project) -> usize {
        project.files.iter().filter(|f| f.path().starts_with("compiler/branch")).count()
    }

    #[test]
    fn test_define_with_default() {
        let commands = root("define int score = 5");
        assert!(commands.contains(&"scoreboard objectives add score dummy".to_string()));
        assert!(commands.contains(&"scoreboard players set @s score 5".to_string()));
    }

    #[test]
    fn test_select_then_print() {
        let commands = root("select @a\nprint \"hi\"");
        assert_eq!(commands.last().unwrap(), r#"tellraw @a {"rawtext":[{"text":"hi"}]}"#);
    }

    #[test]
    fn test_print_with_score_aligns() {
        let commands = root("define int score\nselect @a\nprint \"{score}\"");
        let last = commands.last().unwrap();
        assert!(last.starts_with("execute @a ~ ~ ~ tellraw @s"), "{}", last);
        assert!(last.contains(r#""objective":"score""#));
    }

    #[test]
    fn test_operation_under_selector_aligns() {
        let commands = root("define int score\nselect @a[tag=red]\nscore += 2");
        assert_eq!(commands.last().unwrap(), "execute @a[tag=red] ~ ~ ~ scoreboard players add @s score 2");
    }

    #[test]
    fn test_expression_temps_follow_selector() {
        let commands = root("define int score\nselect @a[tag=red]\nscore = score * 3");
        let lowered: Vec<_> = commands.iter().filter(|c| c.contains("operation") || c.contains(" set ")).collect();
        assert!(!lowered.is_empty());
        assert!(lowered.iter().all(|c| c.starts_with("execute @a[tag=red] ~ ~ ~ ")));
    }

    #[test]
    fn test_precedence_with_counters() {
        let definitions = "define int a = 2\ndefine int b = 3\ndefine int c = 4\ndefine int r\n";
        let scores = replay(&root(&format!("{}r = a + b * c", definitions)));
        assert_eq!(scores["r"], 14);
        let scores = replay(&root(&format!("{}r = (a + b) * c", definitions)));
        assert_eq!(scores["r"], 20);
        let scores = replay(&root(&format!("{}r = c - b - a", definitions)));
        assert_eq!(scores["r"], -1);
    }

    #[test]
    fn test_tiny_decimal_literal() {
        assert!(run("define decimal 2 d = 1.5\nd = d * 0.0000000001").is_ok());
        assert!(run("define decimal 2 d\nif d > 0.000000000001\nsay \"positive\"").is_ok());
    }

    #[test]
    fn test_define_then_inline_condition() {
        let project = run("define int score = 5\nif score > 3\nsay \"big\"").unwrap();
        assert_eq!(project.files.len(), 1);
        assert_eq!(
            project.files[0].commands,
            vec![
                "scoreboard objectives add score dummy",
                "scoreboard players set @s score 5",
                "execute @s[scores={score=4..}] ~ ~ ~ say big",
            ]
        );
    }

    #[test]
    fn test_double_not_is_identity() {
        let plain = root("define int x\nif x > 3\nsay \"a\"");
        assert_eq!(root("define int x\nif not not x > 3\nsay \"a\""), plain);
        assert_eq!(root("define int x\nif not not not x > 3\nsay \"a\""), root("define int x\nif not x > 3\nsay \"a\""));
    }

    #[test]
    fn test_branch_file_only_for_two_or_more() {
        let one = run("define int x\nif x > 1 {\nsay \"a\"\n}").unwrap();
        assert_eq!(branch_files(&one), 0);
        assert!(one.files[0].commands.contains(&"execute @s[scores={x=2..}] ~ ~ ~ say a".to_string()));

        let two = run("define int x\nif x > 1 {\nsay \"a\"\nsay \"b\"\n}").unwrap();
        assert_eq!(branch_files(&two), 1);
    }

    #[test]
    fn test_empty_body_emits_nothing() {
        let commands = root("if count @e[type=cow] > 2 {\n}\nsay \"after\"");
        assert_eq!(commands, vec!["say after"]);
        assert!(commands.iter().all(|c| !c.contains(COUNTING_TAG) && !c.contains(TEMP_PREFIX)));

        let commands = root("define int x\ndefine int y\nif x > 1 and y < 2 {\n}\nelse {\n}\nsay \"after\"");
        assert_eq!(commands.last().unwrap(), "say after");
        assert!(commands.iter().all(|c| !c.contains(TEMP_PREFIX)));
    }

    #[test]
    fn test_unused_filter_does_not_leak() {
        let commands = root("define int x\nif x > 1 {\n$var y 3\n}\nsay \"after\"");
        assert_eq!(commands.last().unwrap(), "say after");
        let commands = root("define int x\nif x > 1\n$var y 3\nsay \"after\"");
        assert_eq!(commands.last().unwrap(), "say after");
    }

    #[test]
    fn test_if_else() {
        let commands = root("define int score\nif score > 3\nsay \"big\"\nelse\nsay \"small\"");
        assert!(commands.iter().any(|c| c.contains("scores={score=4..}") && c.ends_with("say big")));
        assert!(commands.iter().any(|c| c.contains("scores={score=..3}") && c.ends_with("say small")));
    }

    #[test]
    fn test_else_without_if() {
        let err = run("else\nsay \"x\"").unwrap_err();
        assert_eq!(err.message(), "No if statement before this else.");
    }

    #[test]
    fn test_halt_marks_unreachable() {
        let err = run("halt\nsay \"never\"").unwrap_err();
        assert_eq!(err.message(), "Unreachable code detected.");
        assert!(run("select @a {\nhalt\n}\nsay \"after\"").is_ok());
    }

    #[test]
    fn test_halt_then_nested_block() {
        let project = run("halt\n{\nsay \"inside\"\n}").unwrap();
        assert!(project.files[0].commands.contains(&"say inside".to_string()));
    }

    #[test]
    fn test_std_file_emitted_once() {
        let project = run("remove\nremove @e[type=cow]").unwrap();
        let count = project.files.iter().filter(|f| f.path() == "compiler/silent_remove").count();
        assert_eq!(count, 1);
        assert!(project.files[0].commands.contains(&"execute @e[type=cow] ~ ~ ~ function compiler/silent_remove".to_string()));
    }

    #[test]
    fn test_give_components() {
        let commands = root("give \"diamond_sword\" 1 0 keep lockslot");
        assert_eq!(
            commands[0],
            r#"give @s diamond_sword 1 0 {"minecraft:item_lock":{"mode":"lock_in_slot"},"minecraft:keep_on_death":{}}"#
        );
    }

    #[test]
    fn test_fill_modes() {
        let commands = root("fill hollow \"stone\" 0 0 0 4 4 4\nblock \"dirt\" 1 2 3");
        assert_eq!(commands[0], "fill 0 0 0 4 4 4 stone 0 hollow");
        assert_eq!(commands[1], "setblock 1 2 3 dirt 0 replace");
    }

    #[test]
    fn test_scatter_size_limit() {
        let err = run("scatter \"stone\" 50 0 0 0 100 0 0").unwrap_err();
        assert_eq!(err.message(), "Scatter zone size cannot be larger than 64x256x64.");
        let project = run("scatter \"stone\" 50 0 0 0 4 0 4").unwrap();
        assert_eq!(project.assets[0].name, "scatter_0");
    }

    #[test]
    fn test_null_requires_feature() {
        let err = run("null create \"marker\"").unwrap_err();
        assert!(err.message().contains("feature nulls"));
        let project = run("feature nulls\nnull create \"marker\" \"guard\"").unwrap();
        assert!(project.files[0].commands[0].starts_with("summon dummy:null ~ ~ ~ dummy:class_guard \"marker\""));
        assert!(project.assets.iter().any(|a| a.name == "null"));
    }

    #[test]
    fn test_tag_invalid_mode() {
        let err = run("tag toggle \"x\"").unwrap_err();
        assert_eq!(err.message(), "Invalid mode for tag command: toggle. Valid options are ADD, REMOVE, SINGLE");
    }

    #[test]
    fn test_function_return_and_call() {
        let source = "function add(int a, int b = 2) {\nreturn a + b\n}\ndefine int r\nr = add(1)";
        let project = run(source).unwrap();
        let add = project.file("add").unwrap();
        assert!(add.commands.iter().any(|c| c.contains("_mcc_rv0")));
        assert!(project.files[0].commands.contains(&"function add".to_string()));
    }

    #[test]
    fn test_return_outside_function() {
        let err = run("return 1").unwrap_err();
        assert_eq!(err.message(), "Cannot return a value outside of a function.");
    }

    #[test]
    fn test_struct_fields() {
        let project = run("struct point {\nint x\ndecimal 2 y\n}\ndefine point p").unwrap();
        let root = &project.files[0].commands;
        assert!(root.iter().any(|c| c.starts_with("scoreboard objectives add p")));
    }
}
