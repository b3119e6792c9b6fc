//! Canonical serializer: `AddressBook` ↔ bytes, plus the random padding
//! envelope that is wrapped around the tree before encryption.
//!
//! Encoding always writes every field, zero values and empty strings
//! included, and writes children in display order, so the same tree always
//! produces the same bytes. Decoding treats its input as hostile: nesting
//! depth and node count are capped, and every length is bounds-checked
//! before use.

use rand::Rng;
use std::collections::HashMap;

use super::config::{DecodeLimits, PaddingPolicy, MAX_PADDING_LEN};
use super::error::{AddressBookError, AddressBookResult};
use super::tree::{AddressBook, GroupId, ProfileId, TreeItem};
use super::types::*;
use super::wire::{self, WireReader, WireWriter};

// ─── Field Numbers ──────────────────────────────────────────────────

mod payload_field {
    pub const PREFIX_PADDING: u32 = 1;
    pub const ROOT_GROUP: u32 = 2;
    pub const SUFFIX_PADDING: u32 = 3;
}

mod group_field {
    pub const CREATE_TIME: u32 = 1;
    pub const MODIFY_TIME: u32 = 2;
    pub const NAME: u32 = 3;
    pub const COMMENT: u32 = 4;
    pub const EXPANDED: u32 = 5;
    pub const CHILD_GROUP: u32 = 6;
    pub const COMPUTER: u32 = 7;
}

mod computer_field {
    pub const CREATE_TIME: u32 = 1;
    pub const MODIFY_TIME: u32 = 2;
    pub const CONNECT_TIME: u32 = 3;
    pub const NAME: u32 = 4;
    pub const COMMENT: u32 = 5;
    pub const ADDRESS: u32 = 6;
    pub const PORT: u32 = 7;
    pub const USERNAME: u32 = 8;
    pub const PASSWORD: u32 = 9;
    pub const SESSION_TYPE: u32 = 10;
    pub const MANAGE_CONFIG: u32 = 11;
    pub const VIEW_CONFIG: u32 = 12;
}

mod session_field {
    pub const FLAGS: u32 = 1;
    pub const VIDEO_ENCODING: u32 = 2;
    pub const PIXEL_FORMAT: u32 = 3;
    pub const UPDATE_INTERVAL: u32 = 4;
    pub const COMPRESS_RATIO: u32 = 5;
}

mod pixel_field {
    pub const BITS_PER_PIXEL: u32 = 1;
    pub const RED_MAX: u32 = 2;
    pub const GREEN_MAX: u32 = 3;
    pub const BLUE_MAX: u32 = 4;
    pub const RED_SHIFT: u32 = 5;
    pub const GREEN_SHIFT: u32 = 6;
    pub const BLUE_SHIFT: u32 = 7;
}

// ─── Encode ─────────────────────────────────────────────────────────

/// Serialize the whole tree, starting at the root group.
///
/// Fails only for data that could never be loaded back (a profile with
/// port 0). Body sizes are measured bottom-up first, then the bytes are
/// written top-down in one buffer; both passes use an explicit stack.
pub fn encode(book: &AddressBook) -> AddressBookResult<Vec<u8>> {
    let sizes = EncodedSizes::measure(book)?;
    let root = book.root();
    let mut w = WireWriter::with_capacity(sizes.group_len(root)?);

    let mut stack = vec![EncodeStep::Group(root)];
    while let Some(step) = stack.pop() {
        match step {
            EncodeStep::Group(id) => {
                if id != root {
                    w.begin_message(group_field::CHILD_GROUP, sizes.group_len(id)?);
                }
                write_group_header(&mut w, book.group(id)?);
                stack.extend(book.child_profiles(id)?.iter().rev().map(|p| EncodeStep::Profile(*p)));
                stack.extend(book.child_groups(id)?.iter().rev().map(|g| EncodeStep::Group(*g)));
            }
            EncodeStep::Profile(id) => {
                w.write_bytes(group_field::COMPUTER, sizes.profile_bytes(id)?);
            }
        }
    }
    Ok(w.into_vec())
}

#[derive(Clone, Copy)]
enum EncodeStep {
    Group(GroupId),
    Profile(ProfileId),
}

/// Body length of every group, plus each profile already encoded.
struct EncodedSizes {
    groups: HashMap<GroupId, usize>,
    profiles: HashMap<ProfileId, Vec<u8>>,
}

impl EncodedSizes {
    fn measure(book: &AddressBook) -> AddressBookResult<Self> {
        let mut sizes = Self { groups: HashMap::new(), profiles: HashMap::new() };
        let preorder: Vec<GroupId> = book
            .walk()
            .filter_map(|item| match item {
                TreeItem::Group { id, .. } => Some(id),
                TreeItem::Profile { .. } => None,
            })
            .collect();

        // Reverse pre-order reaches every child before its parent.
        for id in preorder.into_iter().rev() {
            let mut header = WireWriter::new();
            write_group_header(&mut header, book.group(id)?);
            let mut len = header.len();
            for child in book.child_groups(id)? {
                len += wire::message_len(group_field::CHILD_GROUP, sizes.group_len(*child)?);
            }
            for pid in book.child_profiles(id)? {
                let bytes = encode_profile(book.profile(*pid)?)?.into_vec();
                len += wire::message_len(group_field::COMPUTER, bytes.len());
                sizes.profiles.insert(*pid, bytes);
            }
            sizes.groups.insert(id, len);
        }
        Ok(sizes)
    }

    fn group_len(&self, id: GroupId) -> AddressBookResult<usize> {
        self.groups
            .get(&id)
            .copied()
            .ok_or_else(|| AddressBookError::tree(format!("Group not measured: {:?}", id)))
    }

    fn profile_bytes(&self, id: ProfileId) -> AddressBookResult<&[u8]> {
        self.profiles
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| AddressBookError::tree(format!("Profile not measured: {:?}", id)))
    }
}

fn write_group_header(w: &mut WireWriter, group: &ProfileGroup) {
    w.write_i64(group_field::CREATE_TIME, group.create_time);
    w.write_i64(group_field::MODIFY_TIME, group.modify_time);
    w.write_str(group_field::NAME, &group.name);
    w.write_str(group_field::COMMENT, &group.comment);
    w.write_bool(group_field::EXPANDED, group.expanded);
}

fn encode_profile(profile: &ConnectionProfile) -> AddressBookResult<WireWriter> {
    if profile.port == 0 {
        return Err(AddressBookError::invalid_config(format!(
            "Profile '{}' has port 0; ports must be 1-65535",
            profile.name
        )));
    }
    let mut w = WireWriter::with_capacity(128);
    w.write_i64(computer_field::CREATE_TIME, profile.create_time);
    w.write_i64(computer_field::MODIFY_TIME, profile.modify_time);
    w.write_i64(computer_field::CONNECT_TIME, profile.connect_time);
    w.write_str(computer_field::NAME, &profile.name);
    w.write_str(computer_field::COMMENT, &profile.comment);
    w.write_str(computer_field::ADDRESS, &profile.address);
    w.write_u32(computer_field::PORT, profile.port as u32);
    w.write_str(computer_field::USERNAME, &profile.username);
    w.write_str(computer_field::PASSWORD, &profile.password);
    w.write_u32(computer_field::SESSION_TYPE, profile.session_type as u32);
    w.write_message(computer_field::MANAGE_CONFIG, encode_session_config(&profile.manage_config));
    w.write_message(computer_field::VIEW_CONFIG, encode_session_config(&profile.view_config));
    Ok(w)
}

fn encode_session_config(config: &DesktopSessionConfig) -> WireWriter {
    let mut w = WireWriter::with_capacity(48);
    w.write_u32(session_field::FLAGS, config.flags);
    w.write_u32(session_field::VIDEO_ENCODING, config.video_encoding as u32);
    w.write_message(session_field::PIXEL_FORMAT, encode_pixel_format(&config.pixel_format));
    w.write_u32(session_field::UPDATE_INTERVAL, config.update_interval_ms);
    w.write_u32(session_field::COMPRESS_RATIO, config.compress_ratio);
    w
}

fn encode_pixel_format(pf: &PixelFormat) -> WireWriter {
    let mut w = WireWriter::with_capacity(24);
    w.write_u32(pixel_field::BITS_PER_PIXEL, pf.bits_per_pixel);
    w.write_u32(pixel_field::RED_MAX, pf.red_max);
    w.write_u32(pixel_field::GREEN_MAX, pf.green_max);
    w.write_u32(pixel_field::BLUE_MAX, pf.blue_max);
    w.write_u32(pixel_field::RED_SHIFT, pf.red_shift);
    w.write_u32(pixel_field::GREEN_SHIFT, pf.green_shift);
    w.write_u32(pixel_field::BLUE_SHIFT, pf.blue_shift);
    w
}

// ─── Decode ─────────────────────────────────────────────────────────

struct DecodeState {
    limits: DecodeLimits,
    nodes: usize,
}

impl DecodeState {
    fn count_node(&mut self) -> AddressBookResult<()> {
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(AddressBookError::limit(format!(
                "More than {} nodes in address book",
                self.limits.max_nodes
            )));
        }
        Ok(())
    }
}

/// A group's own attributes plus the still-encoded child messages.
struct GroupParts<'a> {
    group: ProfileGroup,
    groups: Vec<&'a [u8]>,
    profiles: Vec<&'a [u8]>,
}

/// Rebuild a tree from bytes produced by [`encode`].
///
/// Children are counted against the limits as their fields are read, and
/// pending groups wait on an explicit stack, so neither a flat flood of
/// records nor deep nesting gets further than the first node over a limit.
pub fn decode(bytes: &[u8], limits: &DecodeLimits) -> AddressBookResult<AddressBook> {
    let mut state = DecodeState { limits: *limits, nodes: 0 };
    state.count_node()?;

    let parts = parse_group(bytes, 0, &mut state)?;
    let mut book = AddressBook::with_root(parts.group);
    let root = book.root();
    let mut pending = Vec::new();
    attach_children(&mut book, root, parts.groups, parts.profiles, 0, &mut pending)?;

    while let Some((parent, bytes, depth)) = pending.pop() {
        let parts = parse_group(bytes, depth, &mut state)?;
        let id = book.add_group(parent, parts.group)?;
        attach_children(&mut book, id, parts.groups, parts.profiles, depth, &mut pending)?;
    }

    log::debug!(
        "Decoded address book: {} groups, {} profiles",
        book.group_count(),
        book.profile_count()
    );
    Ok(book)
}

/// Add a group's profiles now and queue its child groups, first child on top.
fn attach_children<'a>(
    book: &mut AddressBook,
    id: GroupId,
    groups: Vec<&'a [u8]>,
    profiles: Vec<&'a [u8]>,
    depth: usize,
    pending: &mut Vec<(GroupId, &'a [u8], usize)>,
) -> AddressBookResult<()> {
    for bytes in profiles {
        book.add_profile(id, decode_profile(bytes)?)?;
    }
    pending.extend(groups.into_iter().rev().map(|bytes| (id, bytes, depth + 1)));
    Ok(())
}

/// Parse one group found at `depth` (root = 0).
fn parse_group<'a>(
    bytes: &'a [u8],
    depth: usize,
    state: &mut DecodeState,
) -> AddressBookResult<GroupParts<'a>> {
    let mut parts = GroupParts {
        group: ProfileGroup {
            create_time: 0,
            modify_time: 0,
            name: String::new(),
            comment: String::new(),
            expanded: false,
        },
        groups: Vec::new(),
        profiles: Vec::new(),
    };

    let mut r = WireReader::new(bytes);
    while let Some((field, value)) = r.next_field()? {
        match field {
            group_field::CREATE_TIME => parts.group.create_time = value.as_i64("group.create_time")?,
            group_field::MODIFY_TIME => parts.group.modify_time = value.as_i64("group.modify_time")?,
            group_field::NAME => parts.group.name = value.as_str("group.name")?.to_string(),
            group_field::COMMENT => parts.group.comment = value.as_str("group.comment")?.to_string(),
            group_field::EXPANDED => parts.group.expanded = value.as_bool("group.expanded")?,
            group_field::CHILD_GROUP => {
                if depth + 1 > state.limits.max_depth {
                    return Err(AddressBookError::limit(format!(
                        "Group nesting deeper than {}",
                        state.limits.max_depth
                    )));
                }
                state.count_node()?;
                parts.groups.push(value.as_bytes("group.child_group")?);
            }
            group_field::COMPUTER => {
                state.count_node()?;
                parts.profiles.push(value.as_bytes("group.computer")?);
            }
            _ => {} // unknown field, skipped
        }
    }
    Ok(parts)
}

fn decode_profile(bytes: &[u8]) -> AddressBookResult<ConnectionProfile> {
    let mut profile = ConnectionProfile {
        create_time: 0,
        modify_time: 0,
        connect_time: 0,
        name: String::new(),
        comment: String::new(),
        address: String::new(),
        port: DEFAULT_HOST_PORT,
        username: String::new(),
        password: String::new(),
        session_type: SessionType::default(),
        manage_config: DesktopSessionConfig::default(),
        view_config: DesktopSessionConfig::view_only(),
    };
    let mut port = None;

    let mut r = WireReader::new(bytes);
    while let Some((field, value)) = r.next_field()? {
        match field {
            computer_field::CREATE_TIME => profile.create_time = value.as_i64("computer.create_time")?,
            computer_field::MODIFY_TIME => profile.modify_time = value.as_i64("computer.modify_time")?,
            computer_field::CONNECT_TIME => profile.connect_time = value.as_i64("computer.connect_time")?,
            computer_field::NAME => profile.name = value.as_str("computer.name")?.to_string(),
            computer_field::COMMENT => profile.comment = value.as_str("computer.comment")?.to_string(),
            computer_field::ADDRESS => profile.address = value.as_str("computer.address")?.to_string(),
            computer_field::PORT => port = Some(value.as_u64("computer.port")?),
            computer_field::USERNAME => profile.username = value.as_str("computer.username")?.to_string(),
            computer_field::PASSWORD => profile.password = value.as_str("computer.password")?.to_string(),
            computer_field::SESSION_TYPE => {
                let raw = value.as_u32("computer.session_type")?;
                profile.session_type = SessionType::from_u32(raw).ok_or_else(|| {
                    AddressBookError::malformed(format!("Unknown session type {}", raw))
                })?;
            }
            computer_field::MANAGE_CONFIG => {
                profile.manage_config = decode_session_config(value.as_bytes("computer.manage_config")?)?
            }
            computer_field::VIEW_CONFIG => {
                profile.view_config = decode_session_config(value.as_bytes("computer.view_config")?)?
            }
            _ => {}
        }
    }

    profile.port = match port {
        Some(p @ 1..=65535) => p as u16,
        Some(p) => {
            return Err(AddressBookError::malformed(format!("Port {} out of range", p)));
        }
        None => return Err(AddressBookError::malformed("Computer without a port")),
    };
    Ok(profile)
}

fn decode_session_config(bytes: &[u8]) -> AddressBookResult<DesktopSessionConfig> {
    let mut config = DesktopSessionConfig::default();
    let mut r = WireReader::new(bytes);
    while let Some((field, value)) = r.next_field()? {
        match field {
            session_field::FLAGS => config.flags = value.as_u32("session.flags")?,
            session_field::VIDEO_ENCODING => {
                let raw = value.as_u32("session.video_encoding")?;
                config.video_encoding = VideoEncoding::from_u32(raw).ok_or_else(|| {
                    AddressBookError::malformed(format!("Unknown video encoding {}", raw))
                })?;
            }
            session_field::PIXEL_FORMAT => {
                config.pixel_format = decode_pixel_format(value.as_bytes("session.pixel_format")?)?
            }
            session_field::UPDATE_INTERVAL => {
                config.update_interval_ms = value.as_u32("session.update_interval")?
            }
            session_field::COMPRESS_RATIO => config.compress_ratio = value.as_u32("session.compress_ratio")?,
            _ => {}
        }
    }
    Ok(config)
}

fn decode_pixel_format(bytes: &[u8]) -> AddressBookResult<PixelFormat> {
    let mut pf = PixelFormat::default();
    let mut r = WireReader::new(bytes);
    while let Some((field, value)) = r.next_field()? {
        match field {
            pixel_field::BITS_PER_PIXEL => pf.bits_per_pixel = value.as_u32("pixel.bits_per_pixel")?,
            pixel_field::RED_MAX => pf.red_max = value.as_u32("pixel.red_max")?,
            pixel_field::GREEN_MAX => pf.green_max = value.as_u32("pixel.green_max")?,
            pixel_field::BLUE_MAX => pf.blue_max = value.as_u32("pixel.blue_max")?,
            pixel_field::RED_SHIFT => pf.red_shift = value.as_u32("pixel.red_shift")?,
            pixel_field::GREEN_SHIFT => pf.green_shift = value.as_u32("pixel.green_shift")?,
            pixel_field::BLUE_SHIFT => pf.blue_shift = value.as_u32("pixel.blue_shift")?,
            _ => {}
        }
    }
    Ok(pf)
}

// ─── Padding ────────────────────────────────────────────────────────

fn random_padding(rng: &mut impl Rng, max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(0..=max_len.min(MAX_PADDING_LEN));
    let mut padding = vec![0u8; len];
    rng.fill(padding.as_mut_slice());
    padding
}

/// Surround an encoded tree with fresh random prefix and suffix padding.
/// Every call draws new lengths and new content.
pub fn wrap_with_padding(payload: &[u8], policy: &PaddingPolicy) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let prefix = random_padding(&mut rng, policy.max_prefix_len);
    let suffix = random_padding(&mut rng, policy.max_suffix_len);

    let mut w = WireWriter::with_capacity(prefix.len() + payload.len() + suffix.len() + 16);
    w.write_bytes(payload_field::PREFIX_PADDING, &prefix);
    w.write_bytes(payload_field::ROOT_GROUP, payload);
    w.write_bytes(payload_field::SUFFIX_PADDING, &suffix);
    w.into_vec()
}

/// Strip the padding envelope, returning the encoded tree.
pub fn unwrap_padding(bytes: &[u8]) -> AddressBookResult<&[u8]> {
    let mut payload = None;
    let mut r = WireReader::new(bytes);
    while let Some((field, value)) = r.next_field()? {
        match field {
            payload_field::PREFIX_PADDING | payload_field::SUFFIX_PADDING => {
                value.as_bytes("payload.padding")?;
            }
            payload_field::ROOT_GROUP => {
                if payload.is_some() {
                    return Err(AddressBookError::malformed("Payload holds more than one root group"));
                }
                payload = Some(value.as_bytes("payload.root_group")?);
            }
            _ => {}
        }
    }
    payload.ok_or_else(|| AddressBookError::malformed("Payload has no root group"))
}

/// `encode` followed by `wrap_with_padding`.
pub fn encode_payload(book: &AddressBook, policy: &PaddingPolicy) -> AddressBookResult<Vec<u8>> {
    let tree = encode(book)?;
    Ok(wrap_with_padding(&tree, policy))
}

/// `unwrap_padding` followed by `decode`.
pub fn decode_payload(bytes: &[u8], limits: &DecodeLimits) -> AddressBookResult<AddressBook> {
    decode(unwrap_padding(bytes)?, limits)
}
