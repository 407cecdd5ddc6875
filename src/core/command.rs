//! Builders for target command lines.
//!
//! Every function returns one complete command without a leading slash.

use super::coord::Coord;
use super::value::ArithOp;

pub fn objective_add(name: &str) -> String {
    format!("scoreboard objectives add {} dummy", name)
}

pub fn objective_remove(name: &str) -> String {
    format!("scoreboard objectives remove {}", name)
}

pub fn score_set(target: &str, objective: &str, value: i32) -> String {
    format!("scoreboard players set {} {} {}", target, objective, value)
}

pub fn score_add(target: &str, objective: &str, value: i32) -> String {
    format!("scoreboard players add {} {} {}", target, objective, value)
}

pub fn score_remove(target: &str, objective: &str, value: i32) -> String {
    format!("scoreboard players remove {} {} {}", target, objective, value)
}

pub fn score_reset(target: &str, objective: &str) -> String {
    format!("scoreboard players reset {} {}", target, objective)
}

/// `scoreboard players operation`, with `op` one of `=`, `+=`, `-=`,
/// `*=`, `/=`, `%=`, `<`, `>` or `><`.
pub fn score_operation(target: &str, a: &str, op: &str, source: &str, b: &str) -> String {
    format!("scoreboard players operation {} {} {} {} {}", target, a, op, source, b)
}

pub fn score_copy(target: &str, a: &str, source: &str, b: &str) -> String {
    score_operation(target, a, "=", source, b)
}

pub fn score_arith(target: &str, a: &str, op: ArithOp, source: &str, b: &str) -> String {
    let symbol = match op {
        ArithOp::Add => "+=",
        ArithOp::Sub => "-=",
        ArithOp::Mul => "*=",
        ArithOp::Div => "/=",
        ArithOp::Mod => "%=",
    };
    score_operation(target, a, symbol, source, b)
}

pub fn execute(selector: &str, x: Coord, y: Coord, z: Coord, command: &str) -> String {
    format!("execute {} {} {} {} {}", selector, x, y, z, command)
}

pub fn function(path: &str) -> String {
    format!("function {}", path)
}

pub fn say(text: &str) -> String {
    format!("say {}", text)
}

pub fn tellraw(target: &str, json: &str) -> String {
    format!("tellraw {} {}", target, json)
}

/// `kind` is `title`, `subtitle` or `actionbar`.
pub fn titleraw(target: &str, kind: &str, json: &str) -> String {
    format!("titleraw {} {} {}", target, kind, json)
}

pub fn title_times(target: &str, fade_in: i32, stay: i32, fade_out: i32) -> String {
    format!("titleraw {} times {} {} {}", target, fade_in, stay, fade_out)
}

pub fn give(target: &str, item: &str, count: i32, data: i32) -> String {
    format!("give {} {} {} {}", target, item, count, data)
}

pub fn teleport(target: &str, x: Coord, y: Coord, z: Coord) -> String {
    format!("tp {} {} {} {}", target, x, y, z)
}

pub fn teleport_to(target: &str, destination: &str) -> String {
    format!("tp {} {}", target, destination)
}

pub fn teleport_rotated(target: &str, x: Coord, y: Coord, z: Coord, ry: Coord, rx: Coord) -> String {
    format!("tp {} {} {} {} {} {}", target, x, y, z, ry, rx)
}

pub fn teleport_facing(target: &str, x: Coord, y: Coord, z: Coord, fx: Coord, fy: Coord, fz: Coord) -> String {
    format!("tp {} {} {} {} facing {} {} {}", target, x, y, z, fx, fy, fz)
}

pub fn teleport_facing_entity(target: &str, x: Coord, y: Coord, z: Coord, other: &str) -> String {
    format!("tp {} {} {} {} facing {}", target, x, y, z, other)
}

pub fn setblock(x: Coord, y: Coord, z: Coord, block: &str, data: i32, mode: &str) -> String {
    format!("setblock {} {} {} {} {} {}", x, y, z, block, data, mode)
}

pub fn fill(from: (Coord, Coord, Coord), to: (Coord, Coord, Coord), block: &str, data: i32, mode: &str) -> String {
    format!(
        "fill {} {} {} {} {} {} {} {} {}",
        from.0, from.1, from.2, to.0, to.1, to.2, block, data, mode
    )
}

pub fn fill_replace(
    from: (Coord, Coord, Coord),
    to: (Coord, Coord, Coord),
    block: &str,
    data: i32,
    source: &str,
    source_data: i32,
) -> String {
    format!(
        "fill {} {} {} {} {} {} {} {} replace {} {}",
        from.0, from.1, from.2, to.0, to.1, to.2, block, data, source, source_data
    )
}

pub fn structure_load(name: &str, x: Coord, y: Coord, z: Coord) -> String {
    format!("structure load {} {} {} {}", name, x, y, z)
}

/// Load with partial integrity; `seed` makes the pattern repeatable.
pub fn structure_load_integrity(name: &str, x: Coord, y: Coord, z: Coord, integrity: i32, seed: Option<&str>) -> String {
    let mut command = format!("structure load {} {} {} {} 0_degrees none false true {}", name, x, y, z, integrity);
    if let Some(seed) = seed {
        command.push(' ');
        command.push_str(seed);
    }
    command
}

pub fn kill(target: &str) -> String {
    format!("kill {}", target)
}

pub fn tag_add(target: &str, tag: &str) -> String {
    format!("tag {} add {}", target, tag)
}

pub fn tag_remove(target: &str, tag: &str) -> String {
    format!("tag {} remove {}", target, tag)
}

pub fn damage(target: &str, amount: i32, cause: &str) -> String {
    format!("damage {} {} {}", target, amount, cause)
}

pub fn damage_by(target: &str, amount: i32, cause: &str, damager: &str) -> String {
    format!("damage {} {} {} entity {}", target, amount, cause, damager)
}

pub fn summon(entity: &str, x: Coord, y: Coord, z: Coord, event: Option<&str>, name: Option<&str>) -> String {
    let mut command = format!("summon {} {} {} {}", entity, x, y, z);
    if let Some(event) = event {
        command.push(' ');
        command.push_str(event);
        if let Some(name) = name {
            command.push_str(&format!(" \"{}\"", name));
        }
    }
    command
}

pub fn event(target: &str, event: &str) -> String {
    format!("event entity {} {}", target, event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoreboard_commands() {
        assert_eq!(objective_add("score"), "scoreboard objectives add score dummy");
        assert_eq!(score_set("@s", "score", -4), "scoreboard players set @s score -4");
        assert_eq!(
            score_arith("@s", "a", ArithOp::Mod, "@s", "b"),
            "scoreboard players operation @s a %= @s b"
        );
    }

    #[test]
    fn test_positional_commands() {
        let here = Coord::HERE;
        assert_eq!(execute("@a", here, here, here, "say hi"), "execute @a ~ ~ ~ say hi");
        assert_eq!(
            teleport_facing("@s", here, Coord::relative(1.0), here, Coord::absolute(0), here, here),
            "tp @s ~ ~1 ~ facing 0 ~ ~"
        );
        assert_eq!(
            summon("dummy:null", here, here, here, Some("dummy:named"), Some("marker")),
            "summon dummy:null ~ ~ ~ dummy:named \"marker\""
        );
    }
}
