//! Publish/Subscribe-Berechtigungsmasken
//!
//! Jede Update-Art (Umbenennung, Kommentar, Struktur-Aenderung, ...) gehoert
//! zu genau einer [`Category`]. Eine [`PermissionSet`] ist ein Bitvektor
//! ueber diese Kategorien.
//!
//! ## Drei Autoritaetsstufen
//! ```text
//! Benutzerkonto  (vom Backend)      --+
//! Angefordert    (vom Client)       --+--> UND --> effektive Maske
//! Projekt        (vom Backend)      --+
//! ```
//! Masken werden ausschliesslich per Schnittmenge kombiniert. Eine Session
//! kann dadurch nie mehr Rechte erhalten als Konto, Anfrage und Projekt
//! gemeinsam erlauben.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ReflectorError;

// ---------------------------------------------------------------------------
// Kategorien
// ---------------------------------------------------------------------------

/// Gruppe zusammengehoeriger Update-Kommandos (ein Bit pro Kategorie)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Undefine,
    MakeCode,
    MakeData,
    MoveSegment,
    Rename,
    Function,
    Xref,
    BytePatch,
    Comment,
    OperandType,
    Enumeration,
    Structure,
    Segment,
    TypeInfo,
    Flirt,
}

impl Category {
    /// Alle Kategorien in Bit-Reihenfolge
    pub const ALLE: [Category; 15] = [
        Category::Undefine,
        Category::MakeCode,
        Category::MakeData,
        Category::MoveSegment,
        Category::Rename,
        Category::Function,
        Category::Xref,
        Category::BytePatch,
        Category::Comment,
        Category::OperandType,
        Category::Enumeration,
        Category::Structure,
        Category::Segment,
        Category::TypeInfo,
        Category::Flirt,
    ];

    /// Bit-Position dieser Kategorie
    const fn bit(self) -> u32 {
        match self {
            Self::Undefine => 0,
            Self::MakeCode => 1,
            Self::MakeData => 2,
            Self::MoveSegment => 3,
            Self::Rename => 4,
            Self::Function => 5,
            Self::Xref => 6,
            Self::BytePatch => 7,
            Self::Comment => 8,
            Self::OperandType => 9,
            Self::Enumeration => 10,
            Self::Structure => 11,
            Self::Segment => 12,
            Self::TypeInfo => 13,
            Self::Flirt => 14,
        }
    }

    /// Ordnet ein Update-Kommando seiner Kategorie zu
    ///
    /// Gibt `None` fuer Kommandos zurueck, die keine Updates sind
    /// (Protokoll- und Projektverwaltungsnachrichten).
    pub fn aus_kommando(kommando: &str) -> Option<Self> {
        let kategorie = match kommando {
            "undefine" => Self::Undefine,
            "make_code" => Self::MakeCode,
            "make_data" => Self::MakeData,
            "move_segm" => Self::MoveSegment,
            "rename" | "renamed" => Self::Rename,
            "add_func" | "del_func" | "set_func_start" | "set_func_end" | "func_tail_appended"
            | "func_tail_removed" | "tail_owner_changed" | "func_noret_changed" => {
                Self::Function
            }
            "add_cref" | "add_dref" | "del_cref" | "del_dref" => Self::Xref,
            "byte_patched" => Self::BytePatch,
            "comment" | "cmt_changed" | "area_cmt_changed" | "extra_cmt_changed" => {
                Self::Comment
            }
            "op_type_changed" | "stkvar_defined" => Self::OperandType,
            "enum_created" | "enum_deleted" | "enum_bf_changed" | "enum_renamed"
            | "enum_cmt_changed" | "enum_member_created" | "enum_member_deleted" => {
                Self::Enumeration
            }
            "struc_created" | "struc_deleted" | "struc_renamed" | "struc_expanded"
            | "struc_cmt_changed" | "struc_member_created" | "struc_member_deleted"
            | "struc_member_renamed" | "struc_member_changed" => Self::Structure,
            "segm_added" | "segm_deleted" | "segm_start_changed" | "segm_end_changed"
            | "segm_name_changed" | "segm_class_changed" => Self::Segment,
            "ti_changed" | "local_types_changed" => Self::TypeInfo,
            "validate_flirt_func" => Self::Flirt,
            _ => return None,
        };
        Some(kategorie)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Undefine => "undefine",
            Self::MakeCode => "make_code",
            Self::MakeData => "make_data",
            Self::MoveSegment => "move_segment",
            Self::Rename => "rename",
            Self::Function => "function",
            Self::Xref => "xref",
            Self::BytePatch => "byte_patch",
            Self::Comment => "comment",
            Self::OperandType => "operand_type",
            Self::Enumeration => "enumeration",
            Self::Structure => "structure",
            Self::Segment => "segment",
            Self::TypeInfo => "type_info",
            Self::Flirt => "flirt",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// PermissionSet
// ---------------------------------------------------------------------------

/// Bitmaske ueber [`Category`]
///
/// Aufrufer arbeiten nur mit [`intersect`](Self::intersect),
/// [`has_capability`](Self::has_capability), [`FULL`](Self::FULL) und
/// [`NONE`](Self::NONE); rohe Bit-Arithmetik bleibt in diesem Modul.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u64);

impl PermissionSet {
    /// Alle Bits gesetzt
    pub const FULL: Self = Self(u64::MAX);
    /// Kein Bit gesetzt
    pub const NONE: Self = Self(0);

    /// Erstellt eine Maske aus einem gespeicherten Rohwert
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Rohwert fuer Persistenz und Wire-Format
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Erstellt eine Maske aus einer Liste von Kategorien
    pub fn aus_kategorien(kategorien: &[Category]) -> Self {
        kategorien
            .iter()
            .fold(Self::NONE, |maske, kategorie| maske.mit(*kategorie))
    }

    /// Schnittmenge zweier Masken
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Prueft ob das Bit der Kategorie gesetzt ist
    pub const fn has_capability(self, kategorie: Category) -> bool {
        self.0 & (1u64 << kategorie.bit()) != 0
    }

    /// Prueft ob jedes Bit dieser Maske auch in `other` gesetzt ist
    pub const fn ist_teilmenge_von(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Gibt eine Kopie mit zusaetzlich gesetzter Kategorie zurueck
    pub const fn mit(self, kategorie: Category) -> Self {
        Self(self.0 | (1u64 << kategorie.bit()))
    }

    /// Gibt eine Kopie ohne die Kategorie zurueck
    pub const fn ohne(self, kategorie: Category) -> Self {
        Self(self.0 & !(1u64 << kategorie.bit()))
    }

    /// Kombiniert Konto-, Anfrage- und Projektmaske zur effektiven Maske
    pub const fn effektiv(konto: Self, angefordert: Self, projekt: Self) -> Self {
        konto.intersect(angefordert).intersect(projekt)
    }

    /// Alle Kategorien, deren Bit gesetzt ist
    pub fn kategorien(self) -> impl Iterator<Item = Category> {
        Category::ALLE
            .into_iter()
            .filter(move |kategorie| self.has_capability(*kategorie))
    }
}

impl std::fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PermissionSet({:#x})", self.0)
    }
}

impl std::fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Parst `0x`-Hex, Dezimalzahlen sowie `full` / `none`
impl FromStr for PermissionSet {
    type Err = ReflectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bits = match s {
            "full" => return Ok(Self::FULL),
            "none" => return Ok(Self::NONE),
            _ => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            },
        };
        bits.map(Self)
            .map_err(|_| ReflectorError::UngueltigeMaske(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PermissionPair
// ---------------------------------------------------------------------------

/// Publish- und Subscribe-Maske einer Autoritaetsstufe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionPair {
    /// Recht, Updates dieser Kategorien zu veroeffentlichen
    pub publish: PermissionSet,
    /// Recht, Updates dieser Kategorien von anderen zu empfangen
    pub subscribe: PermissionSet,
}

impl PermissionPair {
    pub const FULL: Self = Self {
        publish: PermissionSet::FULL,
        subscribe: PermissionSet::FULL,
    };

    pub const NONE: Self = Self {
        publish: PermissionSet::NONE,
        subscribe: PermissionSet::NONE,
    };

    pub const fn neu(publish: PermissionSet, subscribe: PermissionSet) -> Self {
        Self { publish, subscribe }
    }

    /// Paarweise Schnittmenge
    pub const fn intersect(self, other: Self) -> Self {
        Self {
            publish: self.publish.intersect(other.publish),
            subscribe: self.subscribe.intersect(other.subscribe),
        }
    }

    /// Prueft die Teilmengen-Beziehung fuer beide Masken
    pub const fn ist_teilmenge_von(self, other: Self) -> bool {
        self.publish.ist_teilmenge_von(other.publish)
            && self.subscribe.ist_teilmenge_von(other.subscribe)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
