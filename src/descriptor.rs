//! launchd descriptor generation.
//!
//! The descriptor is the property list launchd reads to know how to launch and
//! supervise the agent. It is always written wholesale; nothing merges into an
//! existing file.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use tracing::{debug, info};

use crate::{
    constants::{DEFAULT_PORT, SERVE_SUBCOMMAND, SERVICE_LABEL},
    error::DescriptorError,
    runtime::AgentPaths,
};

const PLIST_DOCTYPE: &str = r#"plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

const KEY_LABEL: &str = "Label";
const KEY_PROGRAM_ARGUMENTS: &str = "ProgramArguments";
const KEY_RUN_AT_LOAD: &str = "RunAtLoad";
const KEY_KEEP_ALIVE: &str = "KeepAlive";
const KEY_STDOUT: &str = "StandardOutPath";
const KEY_STDERR: &str = "StandardErrorPath";
const KEY_WORKING_DIRECTORY: &str = "WorkingDirectory";

/// How launchd should launch and supervise the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// launchd label.
    pub label: String,
    /// Absolute path of the agent executable.
    pub program: PathBuf,
    /// Arguments passed after the program.
    pub arguments: Vec<String>,
    /// Start as soon as the descriptor is loaded.
    pub run_at_load: bool,
    /// Relaunch whenever the process exits.
    pub keep_alive: bool,
    /// Where stdout is redirected.
    pub standard_out_path: PathBuf,
    /// Where stderr is redirected.
    pub standard_error_path: PathBuf,
    /// Working directory of the process.
    pub working_directory: PathBuf,
}

impl ServiceDescriptor {
    /// Builds the descriptor for the agent installed at `program`.
    pub fn for_agent(program: PathBuf, paths: &AgentPaths) -> Self {
        Self {
            label: SERVICE_LABEL.to_string(),
            program,
            arguments: vec![
                SERVE_SUBCOMMAND.to_string(),
                "--port".to_string(),
                DEFAULT_PORT.to_string(),
            ],
            run_at_load: true,
            keep_alive: true,
            standard_out_path: paths.log_file.clone(),
            standard_error_path: paths.log_file.clone(),
            working_directory: paths.home.clone(),
        }
    }

    /// Port passed to `serve`, if the arguments carry one.
    pub fn port(&self) -> Option<u16> {
        self.arguments
            .windows(2)
            .find(|pair| pair[0] == "--port")
            .and_then(|pair| pair[1].parse().ok())
    }

    /// Renders the descriptor as an XML property list.
    pub fn to_plist(&self) -> Result<String, DescriptorError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        emit(&mut writer, Event::DocType(BytesText::from_escaped(PLIST_DOCTYPE)))?;

        let mut plist = BytesStart::new("plist");
        plist.push_attribute(("version", "1.0"));
        emit(&mut writer, Event::Start(plist))?;
        emit(&mut writer, Event::Start(BytesStart::new("dict")))?;

        write_key(&mut writer, KEY_LABEL)?;
        write_string(&mut writer, &self.label)?;

        write_key(&mut writer, KEY_PROGRAM_ARGUMENTS)?;
        emit(&mut writer, Event::Start(BytesStart::new("array")))?;
        write_string(&mut writer, &self.program.to_string_lossy())?;
        for argument in &self.arguments {
            write_string(&mut writer, argument)?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("array")))?;

        write_key(&mut writer, KEY_RUN_AT_LOAD)?;
        write_bool(&mut writer, self.run_at_load)?;
        write_key(&mut writer, KEY_KEEP_ALIVE)?;
        write_bool(&mut writer, self.keep_alive)?;

        write_key(&mut writer, KEY_STDOUT)?;
        write_string(&mut writer, &self.standard_out_path.to_string_lossy())?;
        write_key(&mut writer, KEY_STDERR)?;
        write_string(&mut writer, &self.standard_error_path.to_string_lossy())?;
        write_key(&mut writer, KEY_WORKING_DIRECTORY)?;
        write_string(&mut writer, &self.working_directory.to_string_lossy())?;

        emit(&mut writer, Event::End(BytesEnd::new("dict")))?;
        emit(&mut writer, Event::End(BytesEnd::new("plist")))?;

        let mut document = String::from_utf8(writer.into_inner())
            .map_err(|err| DescriptorError::Malformed(err.to_string()))?;
        document.push('\n');
        Ok(document)
    }

    /// Parses a property list produced by [`ServiceDescriptor::to_plist`] (or any plist
    /// carrying the same keys).
    pub fn from_plist(document: &str) -> Result<Self, DescriptorError> {
        let values = parse_dict(document)?;

        let label = values
            .get(KEY_LABEL)
            .and_then(PlistValue::as_str)
            .ok_or(DescriptorError::MissingKey(KEY_LABEL))?
            .to_string();
        let mut program_arguments = values
            .get(KEY_PROGRAM_ARGUMENTS)
            .and_then(PlistValue::as_array)
            .ok_or(DescriptorError::MissingKey(KEY_PROGRAM_ARGUMENTS))?
            .to_vec();
        if program_arguments.is_empty() {
            return Err(DescriptorError::MissingKey(KEY_PROGRAM_ARGUMENTS));
        }
        let program = PathBuf::from(program_arguments.remove(0));

        let path_of = |key: &str| {
            values
                .get(key)
                .and_then(PlistValue::as_str)
                .map(PathBuf::from)
                .unwrap_or_default()
        };
        let flag_of = |key: &str| values.get(key).and_then(PlistValue::as_bool).unwrap_or(false);

        Ok(Self {
            label,
            program,
            arguments: program_arguments,
            run_at_load: flag_of(KEY_RUN_AT_LOAD),
            keep_alive: flag_of(KEY_KEEP_ALIVE),
            standard_out_path: path_of(KEY_STDOUT),
            standard_error_path: path_of(KEY_STDERR),
            working_directory: path_of(KEY_WORKING_DIRECTORY),
        })
    }

    /// Reads and parses the descriptor at `path`.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let contents = fs::read_to_string(path)?;
        Self::from_plist(&contents)
    }

    /// Writes the descriptor to `path`, replacing whatever is there.
    ///
    /// The document is written to a sibling temp file and renamed into place so a
    /// failed write never leaves a truncated descriptor behind.
    pub fn write(&self, path: &Path) -> Result<(), DescriptorError> {
        let document = self.to_plist()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = path.with_extension("plist.tmp");
        fs::write(&staging, document)?;
        if let Err(err) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }

        info!("wrote launch agent descriptor to {}", path.display());
        Ok(())
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DescriptorError> {
    writer
        .write_event(event)
        .map_err(|err| DescriptorError::Malformed(err.to_string()))
}

fn write_key(writer: &mut Writer<Vec<u8>>, key: &str) -> Result<(), DescriptorError> {
    write_text_element(writer, "key", key)
}

fn write_string(writer: &mut Writer<Vec<u8>>, value: &str) -> Result<(), DescriptorError> {
    write_text_element(writer, "string", value)
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    text: &str,
) -> Result<(), DescriptorError> {
    emit(writer, Event::Start(BytesStart::new(tag)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn write_bool(writer: &mut Writer<Vec<u8>>, value: bool) -> Result<(), DescriptorError> {
    let tag = if value { "true" } else { "false" };
    emit(writer, Event::Empty(BytesStart::new(tag)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PlistValue {
    String(String),
    Bool(bool),
    Array(Vec<String>),
}

impl PlistValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(value) => Some(value),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            PlistValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<&[String]> {
        match self {
            PlistValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

/// Collects the top-level dict of a plist. Only the value types a launch agent
/// descriptor uses are understood; anything else is skipped.
fn parse_dict(document: &str) -> Result<HashMap<String, PlistValue>, DescriptorError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut values = HashMap::new();
    let mut key: Option<String> = None;
    let mut array: Option<Vec<String>> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| DescriptorError::Malformed(err.to_string()))?;

        match event {
            Event::Start(start) => match start.name().as_ref() {
                b"key" | b"string" => text.clear(),
                b"array" => array = Some(Vec::new()),
                _ => {}
            },
            Event::Text(chunk) => {
                let decoded = chunk
                    .unescape()
                    .map_err(|err| DescriptorError::Malformed(err.to_string()))?;
                text.push_str(&decoded);
            }
            Event::End(end) => match end.name().as_ref() {
                b"key" => key = Some(std::mem::take(&mut text)),
                b"string" => {
                    let value = std::mem::take(&mut text);
                    if let Some(items) = array.as_mut() {
                        items.push(value);
                    } else if let Some(name) = key.take() {
                        values.insert(name, PlistValue::String(value));
                    }
                }
                b"array" => {
                    if let (Some(name), Some(items)) = (key.take(), array.take()) {
                        values.insert(name, PlistValue::Array(items));
                    }
                }
                _ => {}
            },
            Event::Empty(empty) => {
                let value = match empty.name().as_ref() {
                    b"true" => Some(PlistValue::Bool(true)),
                    b"false" => Some(PlistValue::Bool(false)),
                    b"string" => Some(PlistValue::String(String::new())),
                    _ => None,
                };
                match value {
                    Some(PlistValue::String(value)) if array.is_some() => {
                        if let Some(items) = array.as_mut() {
                            items.push(value);
                        }
                    }
                    Some(value) => {
                        if let Some(name) = key.take() {
                            values.insert(name, value);
                        }
                    }
                    None => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!("parsed {} descriptor keys", values.len());
    Ok(values)
}
