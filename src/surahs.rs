/// A chapter that can be selected for memorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurahInfo {
    pub id: u32,
    pub name: &'static str,
    pub english_name: &'static str,
    pub total_ayahs: u32,
}

const fn surah(
    id: u32,
    name: &'static str,
    english_name: &'static str,
    total_ayahs: u32,
) -> SurahInfo {
    SurahInfo {
        id,
        name,
        english_name,
        total_ayahs,
    }
}

/// Selectable surahs, in menu order.
pub static SURAHS: &[SurahInfo] = &[
    surah(1, "الفاتحة", "Al-Fatihah", 7),
    surah(112, "الإخلاص", "Al-Ikhlas", 4),
    surah(113, "الفلق", "Al-Falaq", 5),
    surah(114, "الناس", "An-Nas", 6),
    surah(2, "البقرة", "Al-Baqarah", 286),
    surah(36, "يس", "Ya-Sin", 83),
    surah(55, "الرحمن", "Ar-Rahman", 78),
    surah(67, "الملك", "Al-Mulk", 30),
];

pub fn find(id: u32) -> Option<&'static SurahInfo> {
    SURAHS.iter().find(|s| s.id == id)
}

/// Position of a surah in [`SURAHS`], falling back to the first entry.
pub fn index_of(id: u32) -> usize {
    SURAHS.iter().position(|s| s.id == id).unwrap_or(0)
}
