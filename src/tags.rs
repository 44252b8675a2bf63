//! Tag store access. Field names follow the EasyID3 vocabulary: plain text
//! frames, the tagger `TXXX` descriptions below, `website` (WOAR),
//! `musicbrainz_trackid` (UFID) and `performer:<role>` (TMCL). Any other
//! field is kept in a `TXXX` frame named after the field.

use std::path::Path;

use anyhow::{Context, Result, bail};
use id3::frame::{
    Content, ExtendedText, InvolvedPeopleList, InvolvedPeopleListItem, UniqueFileIdentifier,
};
use id3::{Frame, Tag, TagLike, Version};

use crate::literal::CellValue;

const TEXT_FRAMES: &[(&str, &str)] = &[
    ("album", "TALB"),
    ("albumartist", "TPE2"),
    ("albumartistsort", "TSO2"),
    ("albumsort", "TSOA"),
    ("arranger", "TPE4"),
    ("artist", "TPE1"),
    ("artistsort", "TSOP"),
    ("author", "TOLY"),
    ("bpm", "TBPM"),
    ("compilation", "TCMP"),
    ("composer", "TCOM"),
    ("composersort", "TSOC"),
    ("conductor", "TPE3"),
    ("copyright", "TCOP"),
    ("date", "TDRC"),
    ("discnumber", "TPOS"),
    ("discsubtitle", "TSST"),
    ("encodedby", "TENC"),
    ("genre", "TCON"),
    ("grouping", "TIT1"),
    ("isrc", "TSRC"),
    ("language", "TLAN"),
    ("length", "TLEN"),
    ("lyricist", "TEXT"),
    ("media", "TMED"),
    ("mood", "TMOO"),
    ("organization", "TPUB"),
    ("originaldate", "TDOR"),
    ("title", "TIT2"),
    ("titlesort", "TSOT"),
    ("tracknumber", "TRCK"),
    ("version", "TIT3"),
];

/// `TXXX` descriptions written by taggers such as Picard.
const USER_TEXTS: &[(&str, &str)] = &[
    ("acoustid_fingerprint", "Acoustid Fingerprint"),
    ("acoustid_id", "Acoustid Id"),
    ("asin", "ASIN"),
    ("barcode", "BARCODE"),
    ("catalognumber", "CATALOGNUMBER"),
    ("musicbrainz_albumartistid", "MusicBrainz Album Artist Id"),
    ("musicbrainz_albumid", "MusicBrainz Album Id"),
    ("musicbrainz_albumstatus", "MusicBrainz Album Status"),
    ("musicbrainz_albumtype", "MusicBrainz Album Type"),
    ("musicbrainz_artistid", "MusicBrainz Artist Id"),
    ("musicbrainz_discid", "MusicBrainz Disc Id"),
    ("musicbrainz_releasegroupid", "MusicBrainz Release Group Id"),
    ("musicbrainz_releasetrackid", "MusicBrainz Release Track Id"),
    ("musicbrainz_trmid", "MusicBrainz TRM Id"),
    ("musicbrainz_workid", "MusicBrainz Work Id"),
    ("musicip_fingerprint", "MusicMagic Fingerprint"),
    ("musicip_puid", "MusicIP PUID"),
    ("performer", "PERFORMER"),
    ("releasecountry", "MusicBrainz Album Release Country"),
];

const WEBSITE_FIELD: &str = "website";
const WEBSITE_FRAME: &str = "WOAR";
const TRACK_ID_FIELD: &str = "musicbrainz_trackid";
const TRACK_ID_OWNER: &str = "http://musicbrainz.org";
const PERFORMER_PREFIX: &str = "performer:";
const PERFORMER_FRAME: &str = "TMCL";

const NUMBERING_FIELDS: &[&str] = &["tracknumber", "discnumber"];
const VALUE_SEPARATOR: char = '\0';

pub trait TagStore {
    fn get(&self, field: &str) -> CellValue;
    fn set(&mut self, field: &str, value: &CellValue) -> Result<()>;
    /// Removes the field; returns whether anything was removed.
    fn delete(&mut self, field: &str) -> bool;
    /// Names of every field currently present.
    fn fields(&self) -> Vec<String>;
    fn save(&self, path: &Path) -> Result<()>;
}

pub trait TagBackend {
    /// Fails when the file has no readable tag container.
    fn load(&self, path: &Path) -> Result<Box<dyn TagStore>>;
    /// Falls back to an empty container instead of failing.
    fn load_or_empty(&self, path: &Path) -> Box<dyn TagStore>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Id3Backend;

impl TagBackend for Id3Backend {
    fn load(&self, path: &Path) -> Result<Box<dyn TagStore>> {
        let tag = Tag::read_from_path(path)
            .with_context(|| format!("reading id3 tag from {}", path.display()))?;
        Ok(Box::new(Id3Store { tag }))
    }

    fn load_or_empty(&self, path: &Path) -> Box<dyn TagStore> {
        let store = Tag::read_from_path(path)
            .map(|tag| Id3Store { tag })
            .unwrap_or_else(|_| Id3Store::new());
        Box::new(store)
    }
}

#[derive(Debug, Clone)]
pub struct Id3Store {
    tag: Tag,
}

/// Where a field lives inside an id3 tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot<'f> {
    Text(&'static str),
    Link(&'static str),
    FileId(&'static str),
    Performer(&'f str),
    UserText(&'f str),
}

fn slot(field: &str) -> Slot<'_> {
    let lookup = |table: &[(&'static str, &'static str)]| {
        table
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, target)| *target)
    };
    if let Some(id) = lookup(TEXT_FRAMES) {
        return Slot::Text(id);
    }
    if field.eq_ignore_ascii_case(WEBSITE_FIELD) {
        return Slot::Link(WEBSITE_FRAME);
    }
    if field.eq_ignore_ascii_case(TRACK_ID_FIELD) {
        return Slot::FileId(TRACK_ID_OWNER);
    }
    if let Some(role) = field
        .get(..PERFORMER_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(PERFORMER_PREFIX))
        .map(|_| &field[PERFORMER_PREFIX.len()..])
    {
        return Slot::Performer(role);
    }
    Slot::UserText(lookup(USER_TEXTS).unwrap_or(field))
}

fn field_for_frame(id: &str) -> Option<&'static str> {
    TEXT_FRAMES
        .iter()
        .find(|(_, frame)| *frame == id)
        .map(|(name, _)| *name)
}

fn field_for_description(description: &str) -> String {
    USER_TEXTS
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(description))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| description.to_lowercase())
}

fn is_numbering(field: &str) -> bool {
    NUMBERING_FIELDS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(field))
}

fn split_values(text: &str) -> Vec<String> {
    text.split(VALUE_SEPARATOR)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `text` only when printing the number gives `text` back, so `"03"`
/// or `" 3"` are not rewritten on the way through a sheet.
fn exact_number(text: &str) -> Option<u32> {
    text.parse::<u32>()
        .ok()
        .filter(|n| n.to_string() == text)
}

/// `"3"` reads as `3`, `"3/12"` as `(3, 12)`; anything else stays text.
fn numbering_value(text: &str) -> CellValue {
    let number = match text.split_once('/') {
        None => exact_number(text).map(|n| CellValue::Int(i64::from(n))),
        Some((n, total)) => exact_number(n)
            .zip(exact_number(total))
            .map(|(n, total)| CellValue::Pair(Some(n), Some(total))),
    };
    number.unwrap_or_else(|| CellValue::from_values(split_values(text)))
}

fn numbering_text(field: &str, value: &CellValue) -> Result<Option<String>> {
    match value {
        CellValue::Empty | CellValue::Pair(None, _) => Ok(None),
        CellValue::Int(n) if *n >= 0 => Ok(Some(n.to_string())),
        CellValue::Int(n) => bail!("{field} cannot be negative (got {n})"),
        CellValue::Pair(Some(n), None) => Ok(Some(n.to_string())),
        CellValue::Pair(Some(n), Some(total)) => Ok(Some(format!("{n}/{total}"))),
        CellValue::Text(text) => Ok(Some(text.clone())),
        CellValue::List(_) => bail!("{field} takes a single value, not a list"),
    }
}

fn plain_text(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Empty => None,
        CellValue::Text(text) => Some(text.clone()),
        CellValue::Int(n) => Some(n.to_string()),
        CellValue::Pair(None, _) => None,
        CellValue::Pair(Some(n), None) => Some(n.to_string()),
        CellValue::Pair(Some(n), Some(total)) => Some(format!("{n}/{total}")),
        CellValue::List(items) => Some(items.join(&VALUE_SEPARATOR.to_string())),
    }
}

impl Id3Store {
    pub fn new() -> Self {
        Self { tag: Tag::new() }
    }

    fn user_text(&self, description: &str) -> Option<&ExtendedText> {
        self.tag
            .extended_texts()
            .find(|ext| ext.description.eq_ignore_ascii_case(description))
    }

    fn file_id(&self, owner: &str) -> Option<&UniqueFileIdentifier> {
        self.tag
            .frames()
            .filter_map(|frame| frame.content().unique_file_identifier())
            .find(|ufid| ufid.owner_identifier == owner)
    }

    fn performers(&self) -> Vec<InvolvedPeopleListItem> {
        self.tag
            .get(PERFORMER_FRAME)
            .and_then(|frame| frame.content().involved_people_list())
            .map(|list| list.items.clone())
            .unwrap_or_default()
    }

    fn replace_performers(&mut self, items: Vec<InvolvedPeopleListItem>) {
        self.tag.remove(PERFORMER_FRAME);
        if !items.is_empty() {
            self.tag.add_frame(Frame::with_content(
                PERFORMER_FRAME,
                Content::InvolvedPeopleList(InvolvedPeopleList { items }),
            ));
        }
    }
}

impl TagStore for Id3Store {
    fn get(&self, field: &str) -> CellValue {
        let text = match slot(field) {
            Slot::Text(id) => self.tag.get(id).and_then(|frame| frame.content().text()),
            Slot::Link(id) => self.tag.get(id).and_then(|frame| frame.content().link()),
            Slot::UserText(description) => {
                self.user_text(description).map(|ext| ext.value.as_str())
            }
            Slot::FileId(owner) => {
                return self
                    .file_id(owner)
                    .map(|ufid| {
                        CellValue::Text(String::from_utf8_lossy(&ufid.identifier).into_owned())
                    })
                    .unwrap_or_default();
            }
            Slot::Performer(role) => {
                let names = self
                    .performers()
                    .into_iter()
                    .filter(|item| item.involvement.eq_ignore_ascii_case(role))
                    .map(|item| item.involvee)
                    .collect();
                return CellValue::from_values(names);
            }
        };
        match text {
            None => CellValue::Empty,
            Some(text) if is_numbering(field) => numbering_value(text),
            Some(text) => CellValue::from_values(split_values(text)),
        }
    }

    fn set(&mut self, field: &str, value: &CellValue) -> Result<()> {
        let text = if is_numbering(field) {
            numbering_text(field, value)?
        } else {
            plain_text(value)
        };
        self.delete(field);
        let Some(text) = text else {
            return Ok(());
        };

        match slot(field) {
            Slot::Text(id) => self.tag.set_text(id, text),
            Slot::Link(id) => {
                self.tag.add_frame(Frame::link(id, text));
            }
            Slot::FileId(owner) => {
                self.tag.add_frame(UniqueFileIdentifier {
                    owner_identifier: owner.to_string(),
                    identifier: text.into_bytes(),
                });
            }
            Slot::Performer(role) => {
                let mut items = self.performers();
                items.extend(split_values(&text).into_iter().map(|name| {
                    InvolvedPeopleListItem {
                        involvement: role.to_string(),
                        involvee: name,
                    }
                }));
                self.replace_performers(items);
            }
            Slot::UserText(description) => {
                self.tag.add_frame(ExtendedText {
                    description: description.to_string(),
                    value: text,
                });
            }
        }
        Ok(())
    }

    fn delete(&mut self, field: &str) -> bool {
        match slot(field) {
            Slot::Text(id) | Slot::Link(id) => !self.tag.remove(id).is_empty(),
            Slot::FileId(owner) => {
                if self.file_id(owner).is_none() {
                    return false;
                }
                self.tag
                    .remove_unique_file_identifier_by_owner_identifier(owner);
                true
            }
            Slot::Performer(role) => {
                let mut items = self.performers();
                let before = items.len();
                items.retain(|item| !item.involvement.eq_ignore_ascii_case(role));
                if items.len() == before {
                    return false;
                }
                self.replace_performers(items);
                true
            }
            Slot::UserText(description) => {
                let Some(stored) = self.user_text(description).map(|ext| ext.description.clone())
                else {
                    return false;
                };
                self.tag.remove_extended_text(Some(stored.as_str()), None);
                true
            }
        }
    }

    fn fields(&self) -> Vec<String> {
        let mut names = Vec::new();
        for frame in self.tag.frames() {
            let content = frame.content();
            if let Some(name) = field_for_frame(frame.id()) {
                names.push(name.to_string());
            } else if frame.id() == WEBSITE_FRAME {
                names.push(WEBSITE_FIELD.to_string());
            } else if let Some(ext) = content.extended_text() {
                names.push(field_for_description(&ext.description));
            } else if let Some(ufid) = content.unique_file_identifier() {
                if ufid.owner_identifier == TRACK_ID_OWNER {
                    names.push(TRACK_ID_FIELD.to_string());
                }
            } else if frame.id() == PERFORMER_FRAME {
                if let Some(list) = content.involved_people_list() {
                    names.extend(
                        list.items
                            .iter()
                            .map(|item| format!("{PERFORMER_PREFIX}{}", item.involvement)),
                    );
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.tag
            .write_to_path(path, Version::Id3v24)
            .with_context(|| format!("writing id3 tag to {}", path.display()))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::tagged_mp3;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_plain_and_numbering_fields() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("a.mp3");
        tagged_mp3(
            &path,
            &[("TIT2", "Intro"), ("TRCK", "3/12"), ("TPOS", "1")],
        );

        let store = Id3Backend.load(&path).expect("load");
        assert_eq!(store.get("title"), CellValue::Text("Intro".into()));
        assert_eq!(store.get("tracknumber"), CellValue::Pair(Some(3), Some(12)));
        assert_eq!(store.get("discnumber"), CellValue::Int(1));
        assert_eq!(store.get("album"), CellValue::Empty);
        assert_eq!(
            store.fields(),
            vec!["discnumber".to_string(), "title".into(), "tracknumber".into()]
        );
    }

    #[test]
    fn missing_tag_fails_to_load_but_can_start_empty() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("bare.mp3");
        std::fs::write(&path, b"").expect("write");
        assert!(Id3Backend.load(&path).is_err());
        assert!(Id3Backend.load_or_empty(&path).fields().is_empty());
    }

    #[test]
    fn set_save_and_reload() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("a.mp3");
        tagged_mp3(&path, &[("TIT2", "Old"), ("TCON", "Jazz")]);

        let mut store = Id3Backend.load(&path).expect("load");
        store.set("title", &CellValue::Text("New".into())).unwrap();
        store
            .set("tracknumber", &CellValue::Pair(Some(2), Some(10)))
            .unwrap();
        store.set("genre", &CellValue::Empty).unwrap();
        store
            .set("artist", &CellValue::List(vec!["A".into(), "B".into()]))
            .unwrap();
        store
            .set("acoustid_id", &CellValue::Text("abc".into()))
            .unwrap();
        store.save(&path).expect("save");

        let store = Id3Backend.load(&path).expect("reload");
        assert_eq!(store.get("title"), CellValue::Text("New".into()));
        assert_eq!(store.get("tracknumber"), CellValue::Pair(Some(2), Some(10)));
        assert_eq!(store.get("genre"), CellValue::Empty);
        assert_eq!(
            store.get("artist"),
            CellValue::List(vec!["A".into(), "B".into()])
        );
        assert_eq!(store.get("acoustid_id"), CellValue::Text("abc".into()));
    }

    #[test]
    fn numbering_rejects_lists_and_negatives() {
        let mut store = Id3Store::new();
        assert!(
            store
                .set("tracknumber", &CellValue::List(vec!["1".into()]))
                .is_err()
        );
        assert!(store.set("discnumber", &CellValue::Int(-1)).is_err());
        store.set("tracknumber", &CellValue::Int(4)).unwrap();
        assert_eq!(store.get("tracknumber"), CellValue::Int(4));
    }

    #[test]
    fn delete_reports_presence() {
        let mut store = Id3Store::new();
        store.set("mood", &CellValue::Text("calm".into())).unwrap();
        store.set("custom", &CellValue::Text("x".into())).unwrap();
        assert_eq!(store.fields(), vec!["custom".to_string(), "mood".into()]);
        assert!(store.delete("mood"));
        assert!(store.delete("CUSTOM"));
        assert!(!store.delete("mood"));
        assert!(store.fields().is_empty());
    }

    #[test]
    fn numbering_text_survives_a_pass_through() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("a.mp3");
        tagged_mp3(&path, &[("TRCK", "03"), ("TPOS", "1/02")]);

        let mut store = Id3Backend.load(&path).expect("load");
        let track = store.get("tracknumber");
        let disc = store.get("discnumber");
        assert_eq!(track, CellValue::Text("03".into()));
        assert_eq!(disc, CellValue::Text("1/02".into()));

        store.set("tracknumber", &track).unwrap();
        store.set("discnumber", &disc).unwrap();
        store.save(&path).expect("save");

        let tag = Tag::read_from_path(&path).expect("raw reload");
        assert_eq!(tag.get("TRCK").and_then(|f| f.content().text()), Some("03"));
        assert_eq!(tag.get("TPOS").and_then(|f| f.content().text()), Some("1/02"));
    }

    #[test]
    fn tagger_frames_use_their_field_names() {
        let mut tag = Tag::new();
        tag.add_frame(ExtendedText {
            description: "MusicBrainz Album Id".into(),
            value: "album-uuid".into(),
        });
        tag.add_frame(ExtendedText {
            description: "Acoustid Id".into(),
            value: "acoustid-uuid".into(),
        });
        tag.add_frame(UniqueFileIdentifier {
            owner_identifier: TRACK_ID_OWNER.into(),
            identifier: b"track-uuid".to_vec(),
        });
        tag.add_frame(Frame::link("WOAR", "https://example.com"));
        tag.set_text("TOLY", "Writer");
        let mut store = Id3Store { tag };

        assert_eq!(
            store.fields(),
            vec![
                "acoustid_id".to_string(),
                "author".into(),
                "musicbrainz_albumid".into(),
                "musicbrainz_trackid".into(),
                "website".into(),
            ]
        );
        assert_eq!(
            store.get("musicbrainz_albumid"),
            CellValue::Text("album-uuid".into())
        );
        assert_eq!(
            store.get("musicbrainz_trackid"),
            CellValue::Text("track-uuid".into())
        );
        assert_eq!(
            store.get("website"),
            CellValue::Text("https://example.com".into())
        );

        for field in store.fields() {
            assert!(store.delete(&field), "{field}");
        }
        assert!(store.fields().is_empty());
        assert!(!store.delete("musicbrainz_trackid"));
    }

    #[test]
    fn performer_roles_are_separate_fields() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("a.mp3");
        tagged_mp3(&path, &[("TIT2", "Song")]);

        let mut store = Id3Backend.load(&path).expect("load");
        store
            .set(
                "performer:guitar",
                &CellValue::List(vec!["Ann".into(), "Bo".into()]),
            )
            .unwrap();
        store
            .set("performer:drums", &CellValue::Text("Cy".into()))
            .unwrap();
        store.save(&path).expect("save");

        let mut store = Id3Backend.load(&path).expect("reload");
        assert_eq!(
            store.fields(),
            vec![
                "performer:drums".to_string(),
                "performer:guitar".into(),
                "title".into(),
            ]
        );
        assert_eq!(
            store.get("performer:guitar"),
            CellValue::List(vec!["Ann".into(), "Bo".into()])
        );
        assert!(store.delete("performer:guitar"));
        assert_eq!(store.get("performer:guitar"), CellValue::Empty);
        assert_eq!(store.get("performer:drums"), CellValue::Text("Cy".into()));
    }
}
