use crate::datatypes::{
    decode_text, pack_zstring, read_i16, read_i32, read_u8, trim_nul, write_i16, write_i32,
    write_u8, CreatureListFlags, ItemListFlags,
};
use crate::subrecord::Subrecord;
use crate::utils::EspError;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// 等级列表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListKind {
    /// LEVC
    Creature,
    /// LEVI
    Item,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::Creature, ListKind::Item];

    /// 记录类型
    pub fn tag(self) -> &'static [u8; 4] {
        match self {
            ListKind::Creature => b"LEVC",
            ListKind::Item => b"LEVI",
        }
    }

    /// 条目对象 ID 所用的子记录类型
    pub fn object_tag(self) -> &'static [u8; 4] {
        match self {
            ListKind::Creature => b"CNAM",
            ListKind::Item => b"INAM",
        }
    }

    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"LEVC" => Some(ListKind::Creature),
            b"LEVI" => Some(ListKind::Item),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::Creature => "LEVC",
            ListKind::Item => "LEVI",
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 列表条目：玩家等级 + 对象 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeveledEntry {
    pub level: i16,
    /// 对象 ID（不含 NUL）
    pub object_id: Vec<u8>,
}

impl LeveledEntry {
    pub fn new(level: i16, object_id: impl Into<Vec<u8>>) -> Self {
        LeveledEntry {
            level,
            object_id: object_id.into(),
        }
    }

    pub fn object_name(&self) -> String {
        decode_text(&self.object_id)
    }
}

/// 等级列表记录（LEVC / LEVI）
#[derive(Debug, Clone, PartialEq)]
pub struct LeveledList {
    kind: ListKind,
    /// 列表 ID，合并时的键（不含 NUL）
    name: Vec<u8>,
    all_levels: bool,
    /// 仅物品列表有效
    all_items: bool,
    chance_none: u8,
    /// INDX 中声明的数量，仅供参考
    declared_count: i32,
    entries: Vec<LeveledEntry>,
    /// 已经与其他来源的同名列表合并过
    merged: bool,
    changed: bool,
}

impl LeveledList {
    pub fn new(kind: ListKind, name: impl Into<Vec<u8>>) -> Self {
        LeveledList {
            kind,
            name: name.into(),
            all_levels: false,
            all_items: false,
            chance_none: 0,
            declared_count: 0,
            entries: Vec::new(),
            merged: false,
            changed: true,
        }
    }

    /// 按文件顺序解析子记录
    ///
    /// 每个 CNAM/INAM 必须紧跟一个 INTV。未知子记录直接报错，不跳过。
    pub fn unpack(kind: ListKind, subrecords: &[Subrecord]) -> Result<Self, EspError> {
        let mut name: Option<Vec<u8>> = None;
        let mut flags = 0i32;
        let mut chance_none = 0u8;
        let mut declared_count = 0i32;
        let mut entries = Vec::new();
        let mut pending_object: Option<Vec<u8>> = None;

        for sub in subrecords {
            let tag = sub.tag();

            if pending_object.is_some() && tag != b"INTV" {
                return Err(Self::malformed(
                    kind,
                    format!("object id not followed by INTV (found {})", sub.tag_str()),
                ));
            }

            match tag {
                b"NAME" => name = Some(trim_nul(sub.data()).to_vec()),
                b"DATA" => {
                    let mut cursor = Self::fixed(kind, sub, 4)?;
                    flags = read_i32(&mut cursor)?;
                }
                b"NNAM" => {
                    let mut cursor = Self::fixed(kind, sub, 1)?;
                    chance_none = read_u8(&mut cursor)?;
                }
                b"INDX" => {
                    let mut cursor = Self::fixed(kind, sub, 4)?;
                    declared_count = read_i32(&mut cursor)?;
                }
                b"CNAM" | b"INAM" => {
                    pending_object = Some(trim_nul(sub.data()).to_vec());
                }
                b"INTV" => {
                    let object_id = pending_object.take().ok_or_else(|| {
                        Self::malformed(kind, "INTV without preceding object id".to_string())
                    })?;
                    let mut cursor = Self::fixed(kind, sub, 2)?;
                    let level = read_i16(&mut cursor)?;
                    entries.push(LeveledEntry { level, object_id });
                }
                _ => {
                    return Err(EspError::UnknownSubrecord {
                        record: kind.as_str().to_string(),
                        subrecord: sub.tag_str(),
                    });
                }
            }
        }

        if pending_object.is_some() {
            return Err(Self::malformed(kind, "object id not followed by INTV".to_string()));
        }

        let name = name.ok_or_else(|| Self::malformed(kind, "missing NAME subrecord".to_string()))?;
        let (all_levels, all_items) = Self::decode_flags(kind, flags);

        Ok(LeveledList {
            kind,
            name,
            all_levels,
            all_items,
            chance_none,
            declared_count,
            entries,
            merged: false,
            changed: false,
        })
    }

    fn fixed<'a>(kind: ListKind, sub: &'a Subrecord, size: usize) -> Result<Cursor<&'a [u8]>, EspError> {
        if sub.size() < size {
            return Err(EspError::TruncatedInput {
                context: format!("{} {} subrecord", kind, sub.tag_str()),
                expected: size,
                available: sub.size(),
            });
        }
        if sub.size() > size {
            return Err(Self::malformed(
                kind,
                format!("{} is {} bytes, expected {}", sub.tag_str(), sub.size(), size),
            ));
        }
        Ok(Cursor::new(sub.data()))
    }

    fn malformed(kind: ListKind, reason: String) -> EspError {
        EspError::MalformedRecord {
            tag: kind.as_str().to_string(),
            reason,
        }
    }

    /// 解码 DATA 标志位，返回 (all_levels, all_items)
    fn decode_flags(kind: ListKind, flags: i32) -> (bool, bool) {
        match kind {
            ListKind::Creature => {
                let flags = CreatureListFlags::from_bits_truncate(flags);
                (flags.contains(CreatureListFlags::ALL_LEVELS), false)
            }
            ListKind::Item => {
                let flags = ItemListFlags::from_bits_truncate(flags);
                (
                    flags.contains(ItemListFlags::ALL_LEVELS),
                    flags.contains(ItemListFlags::ALL_ITEMS),
                )
            }
        }
    }

    fn encode_flags(&self) -> i32 {
        match self.kind {
            ListKind::Creature => {
                let mut flags = CreatureListFlags::empty();
                flags.set(CreatureListFlags::ALL_LEVELS, self.all_levels);
                flags.bits()
            }
            ListKind::Item => {
                let mut flags = ItemListFlags::empty();
                flags.set(ItemListFlags::ALL_ITEMS, self.all_items);
                flags.set(ItemListFlags::ALL_LEVELS, self.all_levels);
                flags.bits()
            }
        }
    }

    /// 重新打包：NAME、DATA、NNAM、INDX，然后每个条目一对 CNAM|INAM + INTV
    pub fn to_subrecords(&self) -> Result<Vec<Subrecord>, EspError> {
        let mut subrecords = Vec::with_capacity(4 + self.entries.len() * 2);

        subrecords.push(Subrecord::new(*b"NAME", pack_zstring(&self.name)));

        let mut data = Vec::with_capacity(4);
        write_i32(&mut data, self.encode_flags())?;
        subrecords.push(Subrecord::new(*b"DATA", data));

        let mut nnam = Vec::with_capacity(1);
        write_u8(&mut nnam, self.chance_none)?;
        subrecords.push(Subrecord::new(*b"NNAM", nnam));

        let mut indx = Vec::with_capacity(4);
        write_i32(&mut indx, self.entries.len() as i32)?;
        subrecords.push(Subrecord::new(*b"INDX", indx));

        let object_tag = *self.kind.object_tag();
        for entry in &self.entries {
            subrecords.push(Subrecord::new(object_tag, pack_zstring(&entry.object_id)));
            let mut intv = Vec::with_capacity(2);
            write_i16(&mut intv, entry.level)?;
            subrecords.push(Subrecord::new(*b"INTV", intv));
        }

        Ok(subrecords)
    }

    /// 与另一个同类型列表合并
    ///
    /// 标志位取或，chance none 取最小值，追加本列表没有的条目，
    /// 然后按等级稳定排序（同等级保持插入顺序）。
    pub fn merge_with(&mut self, other: &LeveledList) -> Result<(), EspError> {
        if self.kind != other.kind {
            return Err(EspError::TypeMismatch {
                left: self.kind.as_str().to_string(),
                right: other.kind.as_str().to_string(),
            });
        }

        self.all_items |= other.all_items;
        self.all_levels |= other.all_levels;
        self.chance_none = self.chance_none.min(other.chance_none);

        for entry in &other.entries {
            if !self.entries.contains(entry) {
                self.entries.push(entry.clone());
            }
        }
        self.entries.sort_by_key(|entry| entry.level);

        self.declared_count = self.entries.len() as i32;
        self.changed = true;
        self.merged = true;

        tracing::debug!(
            list = %self.name(),
            kind = %self.kind,
            entries = self.entries.len(),
            "合并等级列表"
        );

        Ok(())
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn name(&self) -> String {
        decode_text(&self.name)
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn all_levels(&self) -> bool {
        self.all_levels
    }

    pub fn all_items(&self) -> bool {
        self.all_items
    }

    pub fn chance_none(&self) -> u8 {
        self.chance_none
    }

    /// INDX 中声明的数量；合并后等于条目数
    pub fn declared_count(&self) -> i32 {
        self.declared_count
    }

    /// 实际条目数
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[LeveledEntry] {
        &self.entries
    }

    pub fn is_merged(&self) -> bool {
        self.merged
    }

    pub fn set_all_levels(&mut self, value: bool) {
        self.all_levels = value;
        self.changed = true;
    }

    pub fn set_all_items(&mut self, value: bool) -> Result<(), EspError> {
        if self.kind != ListKind::Item {
            return Err(EspError::InvalidOperation(
                "only item lists carry the all-items flag".to_string(),
            ));
        }
        self.all_items = value;
        self.changed = true;
        Ok(())
    }

    pub fn set_chance_none(&mut self, value: u8) -> Result<(), EspError> {
        if value > 100 {
            return Err(EspError::InvalidOperation(format!(
                "chance none must be 0-100, got {}",
                value
            )));
        }
        self.chance_none = value;
        self.changed = true;
        Ok(())
    }

    pub fn push_entry(&mut self, entry: LeveledEntry) {
        self.entries.push(entry);
        self.declared_count = self.entries.len() as i32;
        self.changed = true;
    }

    pub(crate) fn is_changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_list(name: &str, flags: i32, chance_none: u8, entries: &[(i16, &str)]) -> LeveledList {
        let mut subrecords = vec![
            Subrecord::new(*b"NAME", pack_zstring(name.as_bytes())),
            Subrecord::new(*b"DATA", flags.to_le_bytes().to_vec()),
            Subrecord::new(*b"NNAM", vec![chance_none]),
            Subrecord::new(*b"INDX", (entries.len() as i32).to_le_bytes().to_vec()),
        ];
        for (level, id) in entries {
            subrecords.push(Subrecord::new(*b"INAM", pack_zstring(id.as_bytes())));
            subrecords.push(Subrecord::new(*b"INTV", level.to_le_bytes().to_vec()));
        }
        LeveledList::unpack(ListKind::Item, &subrecords).unwrap()
    }

    fn levels(list: &LeveledList) -> Vec<i16> {
        list.entries().iter().map(|e| e.level).collect()
    }

    #[test]
    fn test_unpack_item_list() {
        let list = item_list("random_weapon", 3, 25, &[(1, "iron dagger"), (5, "steel dagger")]);
        assert_eq!(list.name(), "random_weapon");
        assert!(list.all_items());
        assert!(list.all_levels());
        assert_eq!(list.chance_none(), 25);
        assert_eq!(list.declared_count(), 2);
        assert_eq!(list.entries()[1], LeveledEntry::new(5, "steel dagger"));
        assert!(!list.is_merged());
        assert!(!list.is_changed());
    }

    #[test]
    fn test_creature_flag_mapping() {
        let subrecords = vec![
            Subrecord::new(*b"NAME", b"ex_rats\0".to_vec()),
            Subrecord::new(*b"DATA", 1i32.to_le_bytes().to_vec()),
            Subrecord::new(*b"NNAM", vec![0]),
            Subrecord::new(*b"INDX", 1i32.to_le_bytes().to_vec()),
            Subrecord::new(*b"CNAM", b"rat\0".to_vec()),
            Subrecord::new(*b"INTV", 1i16.to_le_bytes().to_vec()),
        ];
        let list = LeveledList::unpack(ListKind::Creature, &subrecords).unwrap();
        assert!(list.all_levels());
        assert!(!list.all_items());

        // 未修改时重新打包结果与输入一致
        assert_eq!(list.to_subrecords().unwrap(), subrecords);
    }

    #[test]
    fn test_item_flag_values() {
        assert!(item_list("a", 1, 0, &[]).all_items());
        assert!(!item_list("a", 1, 0, &[]).all_levels());
        assert!(item_list("b", 2, 0, &[]).all_levels());
        assert!(!item_list("b", 2, 0, &[]).all_items());
        assert_eq!(item_list("c", 3, 0, &[]).encode_flags(), 3);
        assert_eq!(item_list("d", 0, 0, &[]).encode_flags(), 0);
    }

    #[test]
    fn test_unknown_subrecord_is_fatal() {
        let subrecords = vec![
            Subrecord::new(*b"NAME", b"list\0".to_vec()),
            Subrecord::new(*b"XSCL", vec![0, 0, 0, 0]),
        ];
        let result = LeveledList::unpack(ListKind::Item, &subrecords);
        assert!(matches!(result, Err(EspError::UnknownSubrecord { .. })));
    }

    #[test]
    fn test_object_without_level() {
        let subrecords = vec![
            Subrecord::new(*b"NAME", b"list\0".to_vec()),
            Subrecord::new(*b"INAM", b"iron dagger\0".to_vec()),
        ];
        assert!(matches!(
            LeveledList::unpack(ListKind::Item, &subrecords),
            Err(EspError::MalformedRecord { .. })
        ));

        let subrecords = vec![
            Subrecord::new(*b"NAME", b"list\0".to_vec()),
            Subrecord::new(*b"INTV", 1i16.to_le_bytes().to_vec()),
        ];
        assert!(matches!(
            LeveledList::unpack(ListKind::Item, &subrecords),
            Err(EspError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_short_field_is_truncated() {
        let subrecords = vec![
            Subrecord::new(*b"NAME", b"list\0".to_vec()),
            Subrecord::new(*b"INDX", vec![1, 0]),
        ];
        assert!(matches!(
            LeveledList::unpack(ListKind::Item, &subrecords),
            Err(EspError::TruncatedInput { expected: 4, available: 2, .. })
        ));
    }

    #[test]
    fn test_merge_dedups_entries() {
        let mut a = item_list("list", 0, 0, &[(5, "rat_01")]);
        let b = item_list("list", 0, 0, &[(5, "rat_01")]);
        a.merge_with(&b).unwrap();

        assert_eq!(a.count(), 1);
        assert_eq!(a.declared_count(), 1);
        assert!(a.is_merged());
        assert!(a.is_changed());
    }

    #[test]
    fn test_merge_sorts_by_level() {
        let mut a = item_list("list", 0, 0, &[(10, "a"), (3, "b"), (7, "c")]);
        let b = item_list("list", 0, 0, &[(3, "d"), (1, "e")]);
        a.merge_with(&b).unwrap();

        assert_eq!(levels(&a), vec![1, 3, 3, 7, 10]);
        // 同等级保持插入顺序
        assert_eq!(a.entries()[1].object_id, b"b");
        assert_eq!(a.entries()[2].object_id, b"d");
        assert_eq!(a.declared_count(), 5);
    }

    #[test]
    fn test_merge_same_level_same_id_kept_once() {
        let mut a = item_list("list", 0, 0, &[(3, "b")]);
        let b = item_list("list", 0, 0, &[(3, "b"), (3, "c")]);
        a.merge_with(&b).unwrap();
        assert_eq!(levels(&a), vec![3, 3]);
    }

    #[test]
    fn test_merge_flags_and_chance_none() {
        let mut a = item_list("list", 0, 50, &[]);
        let b = item_list("list", 1, 20, &[]);
        a.merge_with(&b).unwrap();

        assert!(a.all_items());
        assert!(!a.all_levels());
        assert_eq!(a.chance_none(), 20);

        let mut c = item_list("list", 2, 10, &[]);
        c.merge_with(&item_list("list", 0, 90, &[])).unwrap();
        assert!(c.all_levels());
        assert_eq!(c.chance_none(), 10);
    }

    #[test]
    fn test_merge_type_mismatch() {
        let mut creatures = LeveledList::new(ListKind::Creature, "list");
        let items = LeveledList::new(ListKind::Item, "list");
        assert!(matches!(
            creatures.merge_with(&items),
            Err(EspError::TypeMismatch { .. })
        ));
        assert!(!creatures.is_merged());
    }

    #[test]
    fn test_repack_after_merge() {
        let mut a = item_list("list", 0, 50, &[(10, "a")]);
        a.merge_with(&item_list("list", 1, 20, &[(2, "b")])).unwrap();

        let subrecords = a.to_subrecords().unwrap();
        let tags: Vec<String> = subrecords.iter().map(|s| s.tag_str()).collect();
        assert_eq!(tags, ["NAME", "DATA", "NNAM", "INDX", "INAM", "INTV", "INAM", "INTV"]);
        assert_eq!(subrecords[3].data(), &2i32.to_le_bytes());
        assert_eq!(subrecords[4].data(), b"b\0");

        let reparsed = LeveledList::unpack(ListKind::Item, &subrecords).unwrap();
        assert_eq!(reparsed.entries(), a.entries());
        assert_eq!(reparsed.chance_none(), 20);
        assert!(reparsed.all_items());
    }

    #[test]
    fn test_setters() {
        let mut creatures = LeveledList::new(ListKind::Creature, "ex_rats");
        assert!(creatures.set_all_items(true).is_err());
        assert!(creatures.set_chance_none(101).is_err());
        creatures.set_chance_none(100).unwrap();
        creatures.push_entry(LeveledEntry::new(4, "rat"));
        assert_eq!(creatures.declared_count(), 1);
        assert_eq!(creatures.entries()[0].object_name(), "rat");
    }
}
