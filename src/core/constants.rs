// FILE: src/core/constants.rs

// Compiler identity
pub const MCC_VERSION: &str = "1.02";
pub const DEFAULT_MINECRAFT_VERSION: &str = "x.xx.xxx";
pub const SOURCE_EXTENSION: &str = "mcc";
pub const FUNCTION_EXTENSION: &str = "mcfunction";

// Output folders
pub const GENERATED_FOLDER: &str = "compiler";
pub const FUNCTIONS_FOLDER: &str = "functions";
pub const ENTITIES_FOLDER: &str = "entities";
pub const STRUCTURES_FOLDER: &str = "structures";

// Counter name limits
pub const MAX_NAME_LENGTH: usize = 16;
pub const MAX_DECIMAL_NAME_LENGTH: usize = MAX_NAME_LENGTH - 2;
pub const MAX_STRUCT_NAME_LENGTH: usize = MAX_NAME_LENGTH - 3;

// Reserved counters
pub const TEMP_PREFIX: &str = "_mcc_tmp";
pub const RETURN_PREFIX: &str = "_mcc_rv";
pub const TIME_MINUTES: &str = "_mcc_t_mins";
pub const TIME_SECONDS: &str = "_mcc_t_secs";
pub const TIME_TEMP: &str = "_mcc_t_temp";
pub const TIME_CONST: &str = "_mcc_t_const";
pub const DECIMAL_WHOLE_SUFFIX: &str = ":w";
pub const DECIMAL_PART_SUFFIX: &str = ":d";

// Reserved tags and entities
pub const COUNTING_TAG: &str = "_mcc_counting";
pub const NULL_ENTITY: &str = "dummy:null";
pub const NULL_EVENT_DESPAWN: &str = "dummy:despawn";
pub const NULL_EVENT_CLEAN: &str = "dummy:class_clean";
pub const NULL_CLASS_PREFIX: &str = "dummy:class_";
pub const DAMAGER_ENTITY: &str = "_dmg_from";
pub const HERE_TAG: &str = "_mcc_here";

// Std files
pub const STD_HALT: &str = "halt_execution";
pub const STD_SILENT_REMOVE: &str = "silent_remove";

// Compiler limits
pub const MAX_INCLUDE_DEPTH: usize = 16;
pub const MAX_SCATTER_SIZE: (i32, i32, i32) = (64, 256, 64);
/// Highest precision a decimal counter may request.
pub const MAX_DECIMAL_PRECISION: usize = 6;

// Interpolation: `{identifier}` or `{@selector[...]}`
pub const FSTRING_PATTERN: &str = r"(\{([a-zA-Z0-9\-:._]{1,16})\})|(\{(@[pseai](\[.+?\])?)\})";
