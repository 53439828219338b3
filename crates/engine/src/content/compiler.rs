use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::info;

use crate::entity::{DamageType, ItemTemplate};
use crate::AppPaths;

use super::database::{CreatureTemplate, DefDatabase};
use super::discovery::{discover_mod_sources, ContentDiscoveryError, ContentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
enum ParsedDef {
    Item(ItemTemplate),
    Creature(CreatureTemplate),
}

impl ParsedDef {
    fn kind(&self) -> &'static str {
        match self {
            ParsedDef::Item(_) => "ItemDef",
            ParsedDef::Creature(_) => "CreatureDef",
        }
    }

    fn def_name(&self) -> &str {
        match self {
            ParsedDef::Item(item) => &item.name,
            ParsedDef::Creature(creature) => &creature.def_name,
        }
    }
}

/// Compiles base content followed by each enabled mod. A later mod replaces
/// same-named definitions from earlier ones; one mod may not define a name twice.
pub fn compile_def_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut items = BTreeMap::<String, ItemTemplate>::new();
    let mut creatures = BTreeMap::<String, CreatureTemplate>::new();
    let mut file_count = 0usize;

    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut seen_in_mod = HashSet::<(&'static str, String)>::new();

        for xml_file in xml_files {
            file_count += 1;
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            for def in parse_defs_document(&source.mod_id, &xml_file, &raw)? {
                if !seen_in_mod.insert((def.kind(), def.def_name().to_string())) {
                    return Err(ContentCompileError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate {} '{}' in mod '{}'; each mod may define a defName only once",
                            def.kind(),
                            def.def_name(),
                            source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: xml_file.clone(),
                        location: None,
                    });
                }
                match def {
                    ParsedDef::Item(item) => {
                        items.insert(item.name.clone(), item);
                    }
                    ParsedDef::Creature(creature) => {
                        creatures.insert(creature.def_name.clone(), creature);
                    }
                }
            }
        }
    }

    info!(
        files = file_count,
        items = items.len(),
        creatures = creatures.len(),
        "content_compiled"
    );
    Ok(DefDatabase::from_defs(
        items.into_values().collect(),
        creatures.into_values().collect(),
    ))
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<ParsedDef>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let ctx = NodeContext {
        mod_id,
        file_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        let def = match child.tag_name().name() {
            "ItemDef" => ParsedDef::Item(parse_item_def(&ctx, child)?),
            "CreatureDef" => ParsedDef::Creature(parse_creature_def(&ctx, child)?),
            other => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected <ItemDef> or <CreatureDef>"
                    ),
                    child,
                ))
            }
        };
        defs.push(def);
    }
    Ok(defs)
}

struct NodeContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl NodeContext<'_, '_> {
    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn number<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a valid number"),
                node,
            )
        })
    }

    /// Iterates element children, rejecting a field that appears twice.
    fn fields<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        def_kind: &str,
    ) -> Result<Vec<(String, Node<'n, 'i>)>, ContentCompileError> {
        let mut seen = HashSet::<String>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            let name = field.tag_name().name().to_string();
            if !seen.insert(name.clone()) {
                return Err(self.error(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{name}> in <{def_kind}>"),
                    field,
                ));
            }
            fields.push((name, field));
        }
        Ok(fields)
    }

    fn missing(&self, node: Node<'_, '_>, field_name: &str, def_kind: &str) -> ContentCompileError {
        self.error(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <{def_kind}>"),
            node,
        )
    }

    fn unknown(&self, node: Node<'_, '_>, field_name: &str, def_kind: &str) -> ContentCompileError {
        self.error(
            ContentErrorCode::UnknownField,
            format!("unknown field <{field_name}> in <{def_kind}>"),
            node,
        )
    }
}

fn parse_slot_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|slot| !slot.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_item_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<ItemTemplate, ContentCompileError> {
    let mut def_name = None;
    let mut class = None;
    let mut slots = Vec::new();
    let mut atk = 0i32;
    let mut def = 0i32;

    for (name, field) in ctx.fields(node, "ItemDef")? {
        match name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "class" => class = Some(ctx.required_text(field, "class")?),
            "slots" => slots = parse_slot_list(&ctx.required_text(field, "slots")?),
            "atk" => atk = ctx.number(field, "atk")?,
            "def" => def = ctx.number(field, "def")?,
            _ => return Err(ctx.unknown(field, &name, "ItemDef")),
        }
    }

    let def_name = def_name.ok_or_else(|| ctx.missing(node, "defName", "ItemDef"))?;
    let class = class.ok_or_else(|| ctx.missing(node, "class", "ItemDef"))?;
    Ok(ItemTemplate::new(def_name, class)
        .with_slots(slots)
        .with_atk(atk)
        .with_def(def))
}

fn parse_creature_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<CreatureTemplate, ContentCompileError> {
    let mut def_name = None;
    let mut level = 0u32;
    let mut hp = None;
    let mut atk = 0u32;
    let mut def = 0u32;
    let mut xp = 0u32;
    let mut damage_type = DamageType::default();
    let mut slots = Vec::new();

    for (name, field) in ctx.fields(node, "CreatureDef")? {
        match name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "level" => level = ctx.number(field, "level")?,
            "hp" => {
                let value: u32 = ctx.number(field, "hp")?;
                if value == 0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "hp must be > 0".to_string(),
                        field,
                    ));
                }
                hp = Some(value);
            }
            "atk" => atk = ctx.number(field, "atk")?,
            "def" => def = ctx.number(field, "def")?,
            "xp" => xp = ctx.number(field, "xp")?,
            "damageType" => {
                let value = ctx.required_text(field, "damageType")?;
                damage_type = value
                    .parse()
                    .map_err(|message| ctx.error(ContentErrorCode::InvalidValue, message, field))?;
            }
            "slots" => slots = parse_slot_list(&ctx.required_text(field, "slots")?),
            _ => return Err(ctx.unknown(field, &name, "CreatureDef")),
        }
    }

    let def_name = def_name.ok_or_else(|| ctx.missing(node, "defName", "CreatureDef"))?;
    let hp = hp.ok_or_else(|| ctx.missing(node, "hp", "CreatureDef"))?;
    Ok(CreatureTemplate {
        def_name,
        level,
        hp,
        atk,
        def,
        xp,
        damage_type,
        slots,
    })
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentDiscoveryError, root: &Path) -> ContentCompileError {
    match error {
        ContentDiscoveryError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}
