use std::fmt;
use std::fs;
use std::path::Path;
use std::str::Lines;

use anyhow::{Context, Result, bail};
use serde::Serialize;

/// One animated degree of freedom, as declared on a `CHANNELS` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Xposition,
    Yposition,
    Zposition,
    Xrotation,
    Yrotation,
    Zrotation,
}

impl Channel {
    pub fn from_label(label: &str) -> Option<Channel> {
        match label.to_ascii_lowercase().as_str() {
            "xposition" => Some(Channel::Xposition),
            "yposition" => Some(Channel::Yposition),
            "zposition" => Some(Channel::Zposition),
            "xrotation" => Some(Channel::Xrotation),
            "yrotation" => Some(Channel::Yrotation),
            "zrotation" => Some(Channel::Zrotation),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Xposition => "Xposition",
            Channel::Yposition => "Yposition",
            Channel::Zposition => "Zposition",
            Channel::Xrotation => "Xrotation",
            Channel::Yrotation => "Yrotation",
            Channel::Zrotation => "Zrotation",
        }
    }

    pub fn is_position(self) -> bool {
        matches!(
            self,
            Channel::Xposition | Channel::Yposition | Channel::Zposition
        )
    }

    pub fn is_rotation(self) -> bool {
        !self.is_position()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One node of the skeleton. Joints live in the [`Skeleton`] arena; `parent`
/// and `children` are indices into it, children in file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Joint {
    pub name: String,
    pub offset: [f32; 3],
    /// Channel labels as declared. Advisory: binding consumes values by
    /// count and position alone, never by label.
    pub channels: Vec<Channel>,
    /// Currently bound motion values, one slot per declared channel. Zero
    /// until a frame is applied; written only by [`Skeleton::apply_row`].
    pub channel_values: Vec<f32>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl Joint {
    pub const END_SITE_NAME: &'static str = "End Site";

    pub fn channel_count(&self) -> usize {
        self.channel_values.len()
    }
}

/// The joint arena. Index 0 is the root whenever any joint exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
}

impl Skeleton {
    pub fn root(&self) -> Option<&Joint> {
        self.joints.first()
    }

    /// Appends a joint and links it under `parent`, which must already be a
    /// valid index. The first joint added becomes the root.
    pub fn add_joint<S: Into<String>>(
        &mut self,
        name: S,
        parent: Option<usize>,
        channel_count: usize,
        offset: [f32; 3],
    ) -> usize {
        let name = name.into();
        log::debug!("created joint '{name}'");
        let index = self.joints.len();
        self.joints.push(Joint {
            name,
            offset,
            channels: Vec::new(),
            channel_values: vec![0.0; channel_count],
            parent,
            children: Vec::new(),
        });
        if let Some(parent_index) = parent {
            self.joints[parent_index].children.push(index);
        }
        index
    }

    /// Total channel count across all joints; the row width a well-formed
    /// motion section is expected to carry.
    pub fn channel_count(&self) -> usize {
        self.joints
            .iter()
            .map(|joint| joint.channel_values.len())
            .sum()
    }

    /// Binds one motion row onto the tree: pre-order walk, each joint with
    /// at least one child consuming its declared channel count from `row`.
    /// Childless joints are skipped outright and consume nothing. Values
    /// missing from a short row bind as zero.
    pub fn apply_row(&mut self, row: &[f32]) {
        let mut cursor = 0;
        let mut stack: Vec<usize> = Vec::new();
        if !self.joints.is_empty() {
            stack.push(0);
        }
        while let Some(index) = stack.pop() {
            let joint = &mut self.joints[index];
            if joint.children.is_empty() {
                continue;
            }
            for value in joint.channel_values.iter_mut() {
                *value = row.get(cursor).copied().unwrap_or(0.0);
                cursor += 1;
            }
            for &child in joint.children.iter().rev() {
                stack.push(child);
            }
        }
    }
}

/// Frame-major motion data. The row width is fixed by the first data row;
/// rows the file never supplied stay zero-filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionTable {
    frame_count: usize,
    channels_per_frame: usize,
    frame_time: f32,
    values: Vec<f32>,
}

impl MotionTable {
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn channels_per_frame(&self) -> usize {
        self.channels_per_frame
    }

    /// Seconds per frame as declared by `Frame Time:`, 0.0 when absent.
    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn row(&self, frame: usize) -> Option<&[f32]> {
        if frame >= self.frame_count {
            return None;
        }
        let start = frame * self.channels_per_frame;
        Some(&self.values[start..start + self.channels_per_frame])
    }
}

/// A parsed BVH file: skeleton, motion data, and every diagnostic the
/// tolerant parser recorded on the way through.
#[derive(Debug, Clone, PartialEq)]
pub struct BvhFile {
    pub skeleton: Skeleton,
    pub motion: MotionTable,
    /// Diagnostics in input order. Each entry was also emitted through
    /// `log::warn!` the moment it was found.
    pub warnings: Vec<String>,
}

impl BvhFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading BVH file at {}", path.display()))?;
        let parsed = Self::parse_str(&text)
            .with_context(|| format!("parsing BVH file {}", path.display()))?;
        log::info!(
            "loaded {}: {} joints, {} frames",
            path.display(),
            parsed.skeleton.joints.len(),
            parsed.motion.frame_count()
        );
        Ok(parsed)
    }

    pub fn parse_bytes(input: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(input).context("BVH payload is not UTF-8")?;
        Self::parse_str(text)
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let mut warnings = Warnings::default();
        let mut lines = text.lines();
        let (skeleton, saw_motion) = parse_hierarchy(&mut lines, &mut warnings)?;
        let motion = if saw_motion {
            parse_motion(&mut lines, &skeleton, &mut warnings)
        } else {
            MotionTable::default()
        };
        Ok(BvhFile {
            skeleton,
            motion,
            warnings: warnings.into_messages(),
        })
    }
}

/// Collects parser diagnostics, mirroring each one to the log immediately.
#[derive(Debug, Default)]
struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    fn report(&mut self, message: String) {
        log::warn!("{message}");
        self.messages.push(message);
    }

    fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

#[derive(Default)]
struct HierarchyBuilder {
    skeleton: Skeleton,
    /// Joints whose `{` has been seen and whose `}` has not.
    open: Vec<usize>,
    /// Joint created by the latest ROOT/JOINT/End Site line, awaiting `{`.
    pending: Option<usize>,
}

impl HierarchyBuilder {
    /// The joint OFFSET/CHANNELS lines currently target: the one awaiting
    /// its `{` if any, otherwise the innermost open scope.
    fn current(&self) -> Option<usize> {
        self.pending.or_else(|| self.open.last().copied())
    }

    fn begin_root(&mut self, name: &str, warnings: &mut Warnings) {
        if !self.skeleton.joints.is_empty() {
            warnings.report(format!("second ROOT '{name}' treated as a JOINT"));
            self.begin_joint(name, warnings);
            return;
        }
        if name.is_empty() {
            warnings.report("ROOT line is missing a name".to_string());
        }
        self.pending = Some(self.skeleton.add_joint(name, None, 0, [0.0; 3]));
    }

    fn begin_joint(&mut self, name: &str, warnings: &mut Warnings) {
        let Some(parent) = self.open.last().copied() else {
            warnings.report(format!("no open joint to attach '{name}' to; line ignored"));
            self.pending = None;
            return;
        };
        if name.is_empty() {
            warnings.report("JOINT line is missing a name".to_string());
        }
        self.pending = Some(self.skeleton.add_joint(name, Some(parent), 0, [0.0; 3]));
    }

    fn begin_end_site(&mut self, warnings: &mut Warnings) {
        let Some(parent) = self.open.last().copied() else {
            warnings.report("no open joint to attach an End Site to; line ignored".to_string());
            self.pending = None;
            return;
        };
        self.pending = Some(
            self.skeleton
                .add_joint(Joint::END_SITE_NAME, Some(parent), 0, [0.0; 3]),
        );
    }

    fn open_scope(&mut self, warnings: &mut Warnings) {
        match self.pending.take() {
            Some(index) => self.open.push(index),
            None => warnings.report("stray '{' with no joint to open".to_string()),
        }
    }

    fn close_scope(&mut self) {
        // Closing more scopes than were opened is tolerated as a no-op.
        self.pending = None;
        self.open.pop();
    }

    fn set_offset(&mut self, rest: &str, warnings: &mut Warnings) {
        let Some(index) = self.current() else {
            warnings.report("OFFSET outside of any joint; line ignored".to_string());
            return;
        };
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() != 3 {
            warnings.report(format!(
                "OFFSET for '{}' has {} fields, expected 3",
                self.skeleton.joints[index].name,
                parts.len()
            ));
        }
        for (slot, part) in parts.iter().take(3).enumerate() {
            match part.parse::<f32>() {
                Ok(value) => self.skeleton.joints[index].offset[slot] = value,
                Err(_) => warnings.report(format!(
                    "unparsable OFFSET component '{part}' for '{}'",
                    self.skeleton.joints[index].name
                )),
            }
        }
    }

    fn set_channels(&mut self, rest: &str, warnings: &mut Warnings) {
        let Some(index) = self.current() else {
            warnings.report("CHANNELS outside of any joint; line ignored".to_string());
            return;
        };
        let name = self.skeleton.joints[index].name.clone();
        let mut parts = rest.split_whitespace();
        let declared = match parts.next() {
            None => {
                warnings.report(format!("CHANNELS for '{name}' is missing its count"));
                return;
            }
            Some(token) => match token.parse::<usize>() {
                Ok(count) => count,
                Err(_) => {
                    warnings.report(format!(
                        "unparsable CHANNELS count '{token}' for '{name}'"
                    ));
                    return;
                }
            },
        };
        let label_tokens: Vec<&str> = parts.collect();

        // A channel count stays fixed once declared; only the root may be
        // re-declared.
        if !self.skeleton.joints[index].channel_values.is_empty() {
            if self.skeleton.joints[index].parent.is_some() {
                warnings.report(format!("duplicate CHANNELS for '{name}' ignored"));
                return;
            }
            warnings.report(format!(
                "duplicate CHANNELS for root '{name}' replaces the earlier declaration"
            ));
        }

        if label_tokens.len() != declared {
            warnings.report(format!(
                "CHANNELS for '{name}' declares {declared} channels but lists {} labels",
                label_tokens.len()
            ));
        }
        let mut channels = Vec::with_capacity(label_tokens.len());
        for token in label_tokens {
            match Channel::from_label(token) {
                Some(channel) => channels.push(channel),
                None => warnings.report(format!("unknown channel label '{token}' on '{name}'")),
            }
        }

        let joint = &mut self.skeleton.joints[index];
        joint.channels = channels;
        joint.channel_values = vec![0.0; declared];
    }

    fn finish(self, warnings: &mut Warnings) -> Result<Skeleton> {
        if !self.open.is_empty() {
            warnings.report(format!(
                "{} joint scope(s) left unclosed",
                self.open.len()
            ));
        }
        if self.skeleton.joints.is_empty() {
            bail!("BVH hierarchy contains no ROOT joint");
        }
        Ok(self.skeleton)
    }
}

/// Consumes lines up to and including the MOTION sentinel. The boolean says
/// whether the sentinel was actually seen before the input ended.
fn parse_hierarchy(lines: &mut Lines<'_>, warnings: &mut Warnings) -> Result<(Skeleton, bool)> {
    let mut builder = HierarchyBuilder::default();

    for raw_line in lines.by_ref() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let keyword = first_token(line);
        match keyword.to_ascii_lowercase().as_str() {
            "hierarchy" => {}
            "motion" => return Ok((builder.finish(warnings)?, true)),
            "{" => builder.open_scope(warnings),
            "}" => builder.close_scope(),
            "root" => builder.begin_root(remainder(line, keyword), warnings),
            "joint" => builder.begin_joint(remainder(line, keyword), warnings),
            "end" => {
                if remainder(line, keyword).eq_ignore_ascii_case("site") {
                    builder.begin_end_site(warnings);
                } else {
                    warnings.report(format!("ignoring unrecognized line '{line}'"));
                }
            }
            "offset" => builder.set_offset(remainder(line, keyword), warnings),
            "channels" => builder.set_channels(remainder(line, keyword), warnings),
            _ => warnings.report(format!("ignoring unrecognized line '{line}'")),
        }
    }

    warnings.report("input ended before a MOTION section".to_string());
    Ok((builder.finish(warnings)?, false))
}

fn parse_motion(lines: &mut Lines<'_>, skeleton: &Skeleton, warnings: &mut Warnings) -> MotionTable {
    let Some(frame_count) = parse_frames_line(lines, warnings) else {
        return MotionTable::default();
    };

    let mut frame_time = 0.0_f32;
    let mut pending_row = None;
    match next_content_line(lines) {
        None => {
            if frame_count > 0 {
                warnings.report("motion data ended before any frame rows".to_string());
            }
            return MotionTable {
                frame_count,
                ..MotionTable::default()
            };
        }
        Some(line) => {
            let normalized = line.replace(':', " ");
            let mut tokens = normalized.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some(first), Some(second))
                    if first.eq_ignore_ascii_case("frame")
                        && second.eq_ignore_ascii_case("time") =>
                {
                    match tokens.next().map(str::parse::<f32>) {
                        Some(Ok(seconds)) => frame_time = seconds,
                        Some(Err(_)) | None => {
                            warnings.report(format!("unparsable Frame Time in '{line}'"));
                        }
                    }
                }
                _ => {
                    warnings.report(format!(
                        "expected a Frame Time: line, found '{line}'; treating it as frame data"
                    ));
                    pending_row = Some(line);
                }
            }
        }
    }

    if frame_count == 0 {
        return MotionTable {
            frame_time,
            ..MotionTable::default()
        };
    }

    // The first data row fixes the width of the whole table.
    let first_line = match pending_row.take().or_else(|| next_content_line(lines)) {
        Some(line) => line,
        None => {
            warnings.report("motion data ended before any frame rows".to_string());
            return MotionTable {
                frame_count,
                frame_time,
                ..MotionTable::default()
            };
        }
    };
    let first_row = parse_row(first_line, warnings);
    let channels_per_frame = first_row.len();
    if channels_per_frame != skeleton.channel_count() {
        warnings.report(format!(
            "frame rows carry {channels_per_frame} values but the skeleton declares {}",
            skeleton.channel_count()
        ));
    }

    // The declared frame count is untrusted; an oversized table aborts
    // motion loading the same way a malformed Frames: line does.
    let table_values = frame_count.checked_mul(channels_per_frame);
    let table_bytes =
        table_values.and_then(|count| count.checked_mul(std::mem::size_of::<f32>()));
    let total = match (table_values, table_bytes) {
        (Some(count), Some(bytes)) if bytes <= isize::MAX as usize => count,
        _ => {
            warnings.report(format!(
                "frame count {frame_count} with {channels_per_frame} values per row \
                 overflows the motion table; motion data discarded"
            ));
            return MotionTable {
                frame_time,
                ..MotionTable::default()
            };
        }
    };

    let mut values = vec![0.0_f32; total];
    values[..channels_per_frame].copy_from_slice(&first_row);

    let mut populated = 1;
    for frame in 1..frame_count {
        let Some(line) = next_content_line(lines) else {
            break;
        };
        let row = parse_row(line, warnings);
        if row.len() != channels_per_frame {
            warnings.report(format!(
                "frame {frame} has {} values, expected {channels_per_frame}",
                row.len()
            ));
        }
        let take = row.len().min(channels_per_frame);
        let start = frame * channels_per_frame;
        values[start..start + take].copy_from_slice(&row[..take]);
        populated += 1;
    }
    if populated < frame_count {
        warnings.report(format!(
            "motion section declares {frame_count} frames but only {populated} rows are present; \
             the rest stay zero"
        ));
    }

    MotionTable {
        frame_count,
        channels_per_frame,
        frame_time,
        values,
    }
}

fn parse_frames_line(lines: &mut Lines<'_>, warnings: &mut Warnings) -> Option<usize> {
    let Some(line) = next_content_line(lines) else {
        warnings.report("motion section is missing its Frames: line".to_string());
        return None;
    };
    let normalized = line.replace(':', " ");
    let mut tokens = normalized.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(keyword), Some(count)) if keyword.eq_ignore_ascii_case("frames") => {
            match count.parse::<usize>() {
                Ok(count) => Some(count),
                Err(_) => {
                    warnings.report(format!("unparsable frame count '{count}'"));
                    None
                }
            }
        }
        (Some(keyword), None) if keyword.eq_ignore_ascii_case("frames") => {
            warnings.report("Frames: line is missing its count".to_string());
            None
        }
        _ => {
            warnings.report(format!("expected a Frames: line, found '{line}'"));
            None
        }
    }
}

fn parse_row(line: &str, warnings: &mut Warnings) -> Vec<f32> {
    line.split_whitespace()
        .map(|token| match token.parse::<f32>() {
            Ok(value) => value,
            Err(_) => {
                warnings.report(format!("unparsable motion value '{token}' read as 0"));
                0.0
            }
        })
        .collect()
}

fn next_content_line<'a>(lines: &mut Lines<'a>) -> Option<&'a str> {
    for line in lines {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Some(trimmed);
        }
    }
    None
}

fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or(line)
}

fn remainder<'a>(line: &'a str, token: &str) -> &'a str {
    line[token.len()..].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TWO_JOINT_CHAIN: &str = r#"HIERARCHY
ROOT Hips
{
    OFFSET 0.0 0.0 0.0
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    JOINT Chest
    {
        OFFSET 0.0 5.21 0.0
        CHANNELS 3 Zrotation Xrotation Yrotation
        End Site
        {
            OFFSET 0.0 3.87 0.0
        }
    }
}
MOTION
Frames: 2
Frame Time: 0.033333
1 2 3 4 5 6 10 20 30
7 8 9 4 5 6 40 50 60
"#;

    #[test]
    fn parses_two_joint_chain() {
        let parsed = BvhFile::parse_str(TWO_JOINT_CHAIN).expect("parsed bvh");
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);

        let joints = &parsed.skeleton.joints;
        assert_eq!(joints.len(), 3);

        let root = parsed.skeleton.root().expect("root joint");
        assert_eq!(root.name, "Hips");
        assert_eq!(root.parent, None);
        assert_eq!(root.children, vec![1]);
        assert_eq!(root.channel_count(), 6);
        assert_eq!(root.channels.len(), 6);
        assert!(root.channels[0].is_position());
        assert!(root.channels[3].is_rotation());

        assert_eq!(joints[1].name, "Chest");
        assert_eq!(joints[1].parent, Some(0));
        assert_eq!(joints[1].children, vec![2]);
        assert_eq!(joints[1].offset, [0.0, 5.21, 0.0]);
        assert_eq!(
            joints[1].channels,
            vec![Channel::Zrotation, Channel::Xrotation, Channel::Yrotation]
        );

        assert_eq!(joints[2].name, Joint::END_SITE_NAME);
        assert_eq!(joints[2].channel_count(), 0);
        assert!(joints[2].children.is_empty());
        assert_eq!(joints[2].offset, [0.0, 3.87, 0.0]);

        assert_eq!(parsed.skeleton.channel_count(), 9);
        assert_eq!(parsed.motion.frame_count(), 2);
        assert_eq!(parsed.motion.channels_per_frame(), 9);
        assert!((parsed.motion.frame_time() - 0.033333).abs() < 1e-6);
        assert_eq!(parsed.motion.row(1).unwrap()[6], 40.0);
        assert_eq!(parsed.motion.row(2), None);
    }

    #[test]
    fn channel_labels_parse_case_insensitively() {
        assert_eq!(Channel::from_label("XPOSITION"), Some(Channel::Xposition));
        assert_eq!(Channel::from_label("zrotation"), Some(Channel::Zrotation));
        assert_eq!(Channel::from_label("Wposition"), None);
        assert_eq!(Channel::Yrotation.label(), "Yrotation");
        assert_eq!(Channel::Yrotation.to_string(), "Yrotation");
        assert!(Channel::Zposition.is_position());
        assert!(!Channel::Zposition.is_rotation());
    }

    #[test]
    fn binds_rows_in_declaration_order() {
        let mut parsed = BvhFile::parse_str(TWO_JOINT_CHAIN).expect("parsed bvh");
        let row: Vec<f32> = parsed.motion.row(0).unwrap().to_vec();
        parsed.skeleton.apply_row(&row);

        let joints = &parsed.skeleton.joints;
        assert_eq!(joints[0].channel_values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(joints[1].channel_values, vec![10.0, 20.0, 30.0]);
        assert!(joints[2].channel_values.is_empty());
    }

    #[test]
    fn binding_is_idempotent() {
        let mut parsed = BvhFile::parse_str(TWO_JOINT_CHAIN).expect("parsed bvh");
        let row: Vec<f32> = parsed.motion.row(1).unwrap().to_vec();
        parsed.skeleton.apply_row(&row);
        let first_pass: Vec<Vec<f32>> = parsed
            .skeleton
            .joints
            .iter()
            .map(|joint| joint.channel_values.clone())
            .collect();
        parsed.skeleton.apply_row(&row);
        let second_pass: Vec<Vec<f32>> = parsed
            .skeleton
            .joints
            .iter()
            .map(|joint| joint.channel_values.clone())
            .collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn binding_skips_childless_joints() {
        // The leaf joint declares channels but has no End Site, so binding
        // must not consume anything for it.
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    JOINT Stub
    {
        OFFSET 1 0 0
        CHANNELS 3 Zrotation Xrotation Yrotation
    }
}
MOTION
Frames: 1
Frame Time: 0.05
1 2 3 4 5 6 10 20 30
"#;
        let mut parsed = BvhFile::parse_str(source).expect("parsed bvh");
        let row: Vec<f32> = parsed.motion.row(0).unwrap().to_vec();
        parsed.skeleton.apply_row(&row);
        assert_eq!(
            parsed.skeleton.joints[0].channel_values,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(parsed.skeleton.joints[1].channel_values, vec![0.0, 0.0, 0.0]);

        // A childless root consumes nothing either.
        let source = "ROOT Solo\n{\nOFFSET 0 0 0\nCHANNELS 3 Zrotation Xrotation Yrotation\n}\nMOTION\nFrames: 1\nFrame Time: 0.05\n9 9 9\n";
        let mut parsed = BvhFile::parse_str(source).expect("parsed bvh");
        let row: Vec<f32> = parsed.motion.row(0).unwrap().to_vec();
        parsed.skeleton.apply_row(&row);
        assert_eq!(parsed.skeleton.joints[0].channel_values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn reparsing_yields_identical_trees() {
        let first = BvhFile::parse_str(TWO_JOINT_CHAIN).expect("parsed bvh");
        let second = BvhFile::parse_str(TWO_JOINT_CHAIN).expect("parsed bvh");
        assert_eq!(first.skeleton, second.skeleton);
        assert_eq!(first.motion, second.motion);
        assert_eq!(first.warnings, second.warnings);
    }

    #[test]
    fn zero_fills_missing_frame_rows() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
        OFFSET 0 1 0
    }
}
MOTION
Frames: 3
Frame Time: 0.05
1 2 3
4 5 6
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("only 2 rows")),
            "{:?}",
            parsed.warnings
        );
        assert_eq!(parsed.motion.frame_count(), 3);
        assert_eq!(parsed.motion.row(1), Some([4.0, 5.0, 6.0].as_slice()));
        assert_eq!(parsed.motion.row(2), Some([0.0, 0.0, 0.0].as_slice()));
    }

    #[test]
    fn warns_on_row_width_mismatch() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
        OFFSET 0 1 0
    }
}
MOTION
Frames: 3
Frame Time: 0.05
1 2 3
4 5
6 7 8 9
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert_eq!(
            parsed
                .warnings
                .iter()
                .filter(|warning| warning.contains("values, expected 3"))
                .count(),
            2,
            "{:?}",
            parsed.warnings
        );
        // Short row zero-padded, long row truncated.
        assert_eq!(parsed.motion.row(1), Some([4.0, 5.0, 0.0].as_slice()));
        assert_eq!(parsed.motion.row(2), Some([6.0, 7.0, 8.0].as_slice()));
    }

    #[test]
    fn first_row_fixes_table_width() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    JOINT Chest
    {
        OFFSET 0 1 0
        CHANNELS 3 Zrotation Xrotation Yrotation
        End Site
        {
            OFFSET 0 1 0
        }
    }
}
MOTION
Frames: 1
Frame Time: 0.05
1 2 3 4 5 6 7
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert_eq!(parsed.motion.channels_per_frame(), 7);
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("skeleton declares 9")),
            "{:?}",
            parsed.warnings
        );
    }

    #[test]
    fn tolerates_malformed_structural_lines() {
        let source = r#"
HIERARCHY
ROOT Hips
{
    OFFSET 0 oops
    CHANNELS 3 Zrotation Wiggle Yrotation
    BANANA 12
    {
    End Site
    {
        OFFSET 0 1 0
    }
}
MOTION
Frames: 1
Frame Time: 0.05
1 2 3
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        let root = parsed.skeleton.root().expect("root joint");
        // Two offset fields missing/unparsable stay zero.
        assert_eq!(root.offset, [0.0, 0.0, 0.0]);
        // The declared count survives even though one label is unknown.
        assert_eq!(root.channel_count(), 3);
        assert_eq!(root.channels, vec![Channel::Zrotation, Channel::Yrotation]);

        let expect_warning = |needle: &str| {
            assert!(
                parsed.warnings.iter().any(|warning| warning.contains(needle)),
                "missing '{needle}' in {:?}",
                parsed.warnings
            );
        };
        expect_warning("OFFSET for 'Hips' has 2 fields");
        expect_warning("unparsable OFFSET component 'oops'");
        expect_warning("unknown channel label 'Wiggle'");
        expect_warning("unrecognized line 'BANANA 12'");
        expect_warning("stray '{'");
    }

    #[test]
    fn structural_lines_outside_any_joint_are_ignored() {
        // Strays both before ROOT and after the root scope closes.
        let source = r#"
HIERARCHY
OFFSET 1 2 3
JOINT Stray
CHANNELS 3 Zrotation Xrotation Yrotation
End Site
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
}
JOINT Tail
MOTION
Frames: 1
Frame Time: 0.05
1 2 3
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");

        assert_eq!(parsed.skeleton.joints.len(), 1);
        let root = parsed.skeleton.root().expect("root joint");
        assert_eq!(root.name, "Hips");
        assert_eq!(root.offset, [0.0, 0.0, 0.0]);
        assert_eq!(root.channel_count(), 3);
        assert!(root.children.is_empty());

        let expect_warning = |needle: &str| {
            assert!(
                parsed.warnings.iter().any(|warning| warning.contains(needle)),
                "missing '{needle}' in {:?}",
                parsed.warnings
            );
        };
        expect_warning("OFFSET outside of any joint");
        expect_warning("no open joint to attach 'Stray' to");
        expect_warning("CHANNELS outside of any joint");
        expect_warning("no open joint to attach an End Site to");
        expect_warning("no open joint to attach 'Tail' to");
        assert_eq!(parsed.warnings.len(), 5, "{:?}", parsed.warnings);
    }

    #[test]
    fn stray_close_braces_are_silent() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
        OFFSET 0 1 0
    }
}
}
}
MOTION
Frames: 1
Frame Time: 0.05
1 2 3
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.skeleton.joints.len(), 2);
    }

    #[test]
    fn second_root_is_demoted_to_joint() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    ROOT Rogue
    {
        OFFSET 0 1 0
        CHANNELS 3 Zrotation Xrotation Yrotation
    }
}
MOTION
Frames: 1
Frame Time: 0.05
1 2 3 4 5 6 7 8 9
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("second ROOT 'Rogue'")),
            "{:?}",
            parsed.warnings
        );
        assert_eq!(parsed.skeleton.joints.len(), 2);
        assert_eq!(parsed.skeleton.joints[1].parent, Some(0));
        assert_eq!(parsed.skeleton.root().unwrap().children, vec![1]);
    }

    #[test]
    fn duplicate_channels_only_redeclares_the_root() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    JOINT Chest
    {
        OFFSET 0 1 0
        CHANNELS 3 Zrotation Xrotation Yrotation
        CHANNELS 2 Xrotation Yrotation
        End Site
        {
            OFFSET 0 1 0
        }
    }
}
MOTION
Frames: 1
Frame Time: 0.05
1 2 3 4 5 6 7 8 9
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        let root = parsed.skeleton.root().expect("root joint");
        assert_eq!(root.channel_count(), 6);
        assert_eq!(root.channels.len(), 6);
        assert_eq!(parsed.skeleton.joints[1].channel_count(), 3);
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("duplicate CHANNELS for root 'Hips'")),
            "{:?}",
            parsed.warnings
        );
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("duplicate CHANNELS for 'Chest' ignored")),
            "{:?}",
            parsed.warnings
        );
    }

    #[test]
    fn missing_root_is_fatal() {
        assert!(BvhFile::parse_str("").is_err());
        assert!(BvhFile::parse_str("MOTION\nFrames: 1\nFrame Time: 0.05\n1 2 3\n").is_err());
        assert!(BvhFile::parse_str("HIERARCHY\nnothing here\n").is_err());
    }

    #[test]
    fn missing_motion_section_warns() {
        let source = "ROOT Hips\n{\nOFFSET 0 0 0\nCHANNELS 3 Zrotation Xrotation Yrotation\n}\n";
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("ended before a MOTION section")),
            "{:?}",
            parsed.warnings
        );
        assert!(parsed.motion.is_empty());
        assert_eq!(parsed.motion.row(0), None);
    }

    #[test]
    fn malformed_frames_line_aborts_motion() {
        let hierarchy = "ROOT Hips\n{\nOFFSET 0 0 0\nCHANNELS 3 Zrotation Xrotation Yrotation\n}\nMOTION\n";

        let parsed = BvhFile::parse_str(hierarchy).expect("parsed bvh");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("missing its Frames: line")),
            "{:?}",
            parsed.warnings
        );
        assert!(parsed.motion.is_empty());

        let source = format!("{hierarchy}Frames: banana\nFrame Time: 0.05\n1 2 3\n");
        let parsed = BvhFile::parse_str(&source).expect("parsed bvh");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("unparsable frame count")),
            "{:?}",
            parsed.warnings
        );
        assert!(parsed.motion.is_empty());
    }

    #[test]
    fn oversized_frame_counts_abort_motion() {
        let hierarchy =
            "ROOT Hips\n{\nOFFSET 0 0 0\nCHANNELS 3 Zrotation Xrotation Yrotation\n}\nMOTION\n";

        // usize::MAX overflows the element count, 2^62 the byte count, and
        // 10^18 fits both but exceeds what a Vec may hold.
        for frames in [
            "18446744073709551615",
            "4611686018427387904",
            "1000000000000000000",
        ] {
            let source = format!("{hierarchy}Frames: {frames}\nFrame Time: 0.05\n1 2 3\n");
            let parsed = BvhFile::parse_str(&source).expect("parsed bvh");
            assert!(
                parsed
                    .warnings
                    .iter()
                    .any(|warning| warning.contains("motion data discarded")),
                "{frames}: {:?}",
                parsed.warnings
            );
            assert!(parsed.motion.is_empty());
            assert_eq!(parsed.motion.row(0), None);
            assert_eq!(parsed.motion.frame_time(), 0.05);
            assert_eq!(parsed.skeleton.joints.len(), 1);
        }
    }

    #[test]
    fn missing_frame_time_line_is_read_as_data() {
        let source = r#"
ROOT Hips
{
    OFFSET 0 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
        OFFSET 0 1 0
    }
}
MOTION
Frames: 1
7 8 9
"#;
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert!(
            parsed
                .warnings
                .iter()
                .any(|warning| warning.contains("expected a Frame Time: line")),
            "{:?}",
            parsed.warnings
        );
        assert_eq!(parsed.motion.frame_time(), 0.0);
        assert_eq!(parsed.motion.row(0), Some([7.0, 8.0, 9.0].as_slice()));
    }

    #[test]
    fn keywords_parse_case_and_spacing_tolerantly() {
        let source = "hierarchy\nroot Hips\n{\noffset 0 0 0\nchannels 3 zrotation xrotation yrotation\nend site\n{\noffset 0 1 0\n}\n}\nmotion\nframes:2\nframe time:0.05\n1 2 3\n4 5 6\n";
        let parsed = BvhFile::parse_str(source).expect("parsed bvh");
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.skeleton.joints.len(), 2);
        assert_eq!(parsed.motion.frame_count(), 2);
        assert_eq!(parsed.motion.frame_time(), 0.05);
        assert_eq!(parsed.motion.row(1), Some([4.0, 5.0, 6.0].as_slice()));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TWO_JOINT_CHAIN.as_bytes()).unwrap();

        let parsed = BvhFile::load(file.path()).expect("loaded bvh");
        assert_eq!(parsed.skeleton.joints.len(), 3);
        assert_eq!(parsed.motion.frame_count(), 2);

        assert!(BvhFile::load("definitely/not/here.bvh").is_err());
    }

    #[test]
    fn parse_bytes_requires_utf8() {
        assert!(BvhFile::parse_bytes(&[0xff, 0xfe, 0x00]).is_err());
        let parsed = BvhFile::parse_bytes(TWO_JOINT_CHAIN.as_bytes()).expect("parsed bvh");
        assert_eq!(parsed.skeleton.joints.len(), 3);
    }

    #[test]
    fn builds_skeletons_programmatically() {
        let mut skeleton = Skeleton::default();
        let hips = skeleton.add_joint("Hips", None, 6, [0.0, 0.0, 0.0]);
        let chest = skeleton.add_joint("Chest", Some(hips), 3, [0.0, 5.0, 0.0]);
        let head = skeleton.add_joint("Head", Some(chest), 3, [0.0, 2.0, 0.0]);
        skeleton.add_joint("LeftLeg", Some(hips), 3, [-1.0, -4.0, 0.0]);

        assert_eq!(skeleton.root().unwrap().children, vec![chest, 3]);
        assert_eq!(skeleton.joints[head].parent, Some(chest));
        assert_eq!(skeleton.channel_count(), 15);

        // Head and LeftLeg are leaves; Hips then Chest consume in order.
        skeleton.apply_row(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(
            skeleton.joints[hips].channel_values,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(skeleton.joints[chest].channel_values, vec![7.0, 8.0, 9.0]);
        assert_eq!(skeleton.joints[head].channel_values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn short_rows_bind_missing_values_as_zero() {
        let mut skeleton = Skeleton::default();
        let hips = skeleton.add_joint("Hips", None, 6, [0.0, 0.0, 0.0]);
        skeleton.add_joint("Chest", Some(hips), 3, [0.0, 5.0, 0.0]);

        skeleton.apply_row(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        skeleton.apply_row(&[9.0, 9.0]);
        assert_eq!(
            skeleton.joints[hips].channel_values,
            vec![9.0, 9.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
