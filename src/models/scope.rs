use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of artifacts a detector can ask to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    SourceFile,
    AllSourceFiles,
    ResourceFile,
    AllResourceFiles,
    ResourceFolder,
    BinaryResource,
    ClassFile,
    AllClassFiles,
    Libraries,
    Manifest,
    BuildFile,
    ProguardFile,
    PropertyFile,
    Other,
    TestSources,
}

impl Scope {
    pub const VALUES: [Scope; 15] = [
        Scope::SourceFile,
        Scope::AllSourceFiles,
        Scope::ResourceFile,
        Scope::AllResourceFiles,
        Scope::ResourceFolder,
        Scope::BinaryResource,
        Scope::ClassFile,
        Scope::AllClassFiles,
        Scope::Libraries,
        Scope::Manifest,
        Scope::BuildFile,
        Scope::ProguardFile,
        Scope::PropertyFile,
        Scope::Other,
        Scope::TestSources,
    ];

    fn bit(self) -> u16 {
        1u16 << (self as u16)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A set of scopes, stored as a bit set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScopeSet(u16);

impl ScopeSet {
    pub const EMPTY: ScopeSet = ScopeSet(0);
    pub const ALL: ScopeSet = ScopeSet((1u16 << Scope::VALUES.len()) - 1);

    pub fn of(scopes: &[Scope]) -> Self {
        scopes.iter().fold(Self::EMPTY, |set, scope| set.with(*scope))
    }

    pub fn single(scope: Scope) -> Self {
        ScopeSet(scope.bit())
    }

    pub fn with(self, scope: Scope) -> Self {
        ScopeSet(self.0 | scope.bit())
    }

    pub fn insert(&mut self, scope: Scope) {
        self.0 |= scope.bit();
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0 & scope.bit() != 0
    }

    /// True when every scope of `other` is also in `self`.
    pub fn contains_all(&self, other: ScopeSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: ScopeSet) -> Self {
        ScopeSet(self.0 | other.0)
    }

    pub fn intersect(self, other: ScopeSet) -> Self {
        ScopeSet(self.0 & other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> {
        let set = *self;
        Scope::VALUES.into_iter().filter(move |s| set.contains(*s))
    }
}

impl fmt::Debug for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == ScopeSet::ALL {
            return write!(f, "ScopeSet(ALL)");
        }
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ScopeSet::EMPTY, |set, scope| set.with(scope))
    }
}

impl From<Scope> for ScopeSet {
    fn from(scope: Scope) -> Self {
        ScopeSet::single(scope)
    }
}

pub const SOURCE_FILE_SCOPE: ScopeSet = ScopeSet(1u16 << Scope::SourceFile as u16);
pub const CLASS_FILE_SCOPE: ScopeSet = ScopeSet(1u16 << Scope::ClassFile as u16);
pub const RESOURCE_FILE_SCOPE: ScopeSet = ScopeSet(1u16 << Scope::ResourceFile as u16);
pub const ALL_SOURCE_FILES_SCOPE: ScopeSet = ScopeSet(1u16 << Scope::AllSourceFiles as u16);
