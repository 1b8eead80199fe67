use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::http::{self, HttpError};
use crate::surahs::SurahInfo;
use crate::transliteration::transliterate;

pub const SURAH_API_BASE: &str = "https://quran-api.santrikoding.com/api/surah";
pub const TRANSLATION_API_BASE: &str = "http://api.alquran.cloud/v1/ayah";
pub const AUDIO_BASE: &str = "https://verses.quran.com/Alafasy/mp3";
pub const TRANSLATION_UNAVAILABLE: &str = "Translation not available.";

/// Everything shown for one verse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AyahData {
    pub arabic: String,
    pub indonesian: String,
    /// `None` when the translation service had nothing for this verse.
    pub english: Option<String>,
    pub transliteration: Option<String>,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("could not fetch ayah {ayah} of surah {surah}: {source}")]
    Http {
        surah: u32,
        ayah: u32,
        #[source]
        source: HttpError,
    },
    #[error("unexpected payload for surah {surah}: {source}")]
    Payload {
        surah: u32,
        #[source]
        source: serde_json::Error,
    },
    #[error("ayah {ayah} not found in surah {surah}")]
    MissingVerse { surah: u32, ayah: u32 },
}

/// Resolves a verse into displayable text.
pub trait ContentSource: Send + Sync {
    fn fetch_ayah(&self, surah: &SurahInfo, ayah: u32) -> Result<AyahData, ContentError>;
}

/// Audio URL for a verse recitation.
pub fn audio_url(surah_id: u32, ayah: u32) -> String {
    format!("{AUDIO_BASE}/{surah_id:03}{ayah:03}.mp3")
}

#[derive(Debug, Deserialize)]
struct SurahPayload {
    ayat: Vec<VersePayload>,
}

#[derive(Debug, Deserialize)]
struct VersePayload {
    ar: String,
    idn: String,
    #[serde(default)]
    tr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    code: u16,
    data: Option<TranslationData>,
}

#[derive(Debug, Deserialize)]
struct TranslationData {
    text: Option<String>,
}

/// Verse text from the santrikoding surah API with an English translation
/// from alquran.cloud.
#[derive(Debug)]
pub struct HttpContentSource {
    agent: ureq::Agent,
    surah_base: String,
    translation_base: String,
    cache: Mutex<HashMap<u32, Arc<SurahPayload>>>,
}

impl Default for HttpContentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpContentSource {
    pub fn new() -> Self {
        Self::with_base_urls(SURAH_API_BASE, TRANSLATION_API_BASE)
    }

    pub fn with_base_urls(surah_base: &str, translation_base: &str) -> Self {
        Self {
            agent: http::agent(http::CONNECT_TIMEOUT, http::READ_TIMEOUT),
            surah_base: surah_base.trim_end_matches('/').to_string(),
            translation_base: translation_base.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn surah_payload(&self, surah: u32, ayah: u32) -> Result<Arc<SurahPayload>, ContentError> {
        if let Some(cached) = self
            .cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&surah).cloned())
        {
            return Ok(cached);
        }

        let url = format!("{}/{}", self.surah_base, surah);
        debug!("fetching {url}");
        let body = http::get_text(&self.agent, &url)
            .map_err(|source| ContentError::Http { surah, ayah, source })?;
        let payload: Arc<SurahPayload> = serde_json::from_str(&body)
            .map(Arc::new)
            .map_err(|source| ContentError::Payload { surah, source })?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(surah, Arc::clone(&payload));
        }
        Ok(payload)
    }

    fn english(&self, surah: u32, ayah: u32) -> Option<String> {
        let url = format!("{}/{}:{}/en.sahih", self.translation_base, surah, ayah);
        let fetched = http::get_text(&self.agent, &url)
            .map_err(|err| err.to_string())
            .and_then(|body| {
                serde_json::from_str::<TranslationPayload>(&body).map_err(|err| err.to_string())
            });

        match fetched {
            Ok(TranslationPayload {
                code: 200,
                data: Some(TranslationData { text: Some(text) }),
            }) => Some(text),
            Ok(other) => {
                debug!("no translation for {surah}:{ayah} (code {})", other.code);
                None
            }
            Err(err) => {
                warn!("failed to fetch English translation for {surah}:{ayah}: {err}");
                None
            }
        }
    }
}

impl ContentSource for HttpContentSource {
    fn fetch_ayah(&self, surah: &SurahInfo, ayah: u32) -> Result<AyahData, ContentError> {
        let payload = self.surah_payload(surah.id, ayah)?;
        let verse = ayah
            .checked_sub(1)
            .and_then(|idx| payload.ayat.get(idx as usize))
            .ok_or(ContentError::MissingVerse {
                surah: surah.id,
                ayah,
            })?;

        let transliteration = match verse.tr.as_deref().map(str::trim) {
            Some(tr) if !tr.is_empty() => tr.to_string(),
            _ => transliterate(&verse.ar),
        };

        Ok(AyahData {
            arabic: verse.ar.clone(),
            indonesian: verse.idn.clone(),
            english: self.english(surah.id, ayah),
            transliteration: Some(transliteration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::TestServer;
    use assert_matches::assert_matches;

    fn surah_body() -> String {
        r#"{"ayat":[
            {"ar":"قُلْ","idn":"Katakanlah","tr":"qul"},
            {"ar":"ٱللَّهُ","idn":"Allah","tr":""}
        ]}"#
        .to_string()
    }

    fn ikhlas() -> SurahInfo {
        crate::surahs::find(112).unwrap().clone()
    }

    fn source_for(server: &TestServer) -> HttpContentSource {
        HttpContentSource::with_base_urls(
            &format!("{}/surah", server.base_url),
            &format!("{}/ayah", server.base_url),
        )
    }

    #[test]
    fn test_audio_url_zero_pads() {
        assert_eq!(
            audio_url(1, 7),
            "https://verses.quran.com/Alafasy/mp3/001007.mp3"
        );
        assert_eq!(
            audio_url(114, 6),
            "https://verses.quran.com/Alafasy/mp3/114006.mp3"
        );
    }

    #[test]
    fn test_fetch_ayah_with_translation() {
        let server = TestServer::spawn(vec![
            ("/surah/112", 200, surah_body()),
            (
                "/ayah/112:1/en.sahih",
                200,
                r#"{"code":200,"data":{"text":"Say"}}"#.to_string(),
            ),
        ]);
        let source = source_for(&server);

        let data = source.fetch_ayah(&ikhlas(), 1).unwrap();

        assert_eq!(data.arabic, "قُلْ");
        assert_eq!(data.indonesian, "Katakanlah");
        assert_eq!(data.english.as_deref(), Some("Say"));
        assert_eq!(data.transliteration.as_deref(), Some("qul"));
    }

    #[test]
    fn test_translation_failure_is_not_fatal() {
        let server = TestServer::spawn(vec![("/surah/112", 200, surah_body())]);
        let source = source_for(&server);

        let data = source.fetch_ayah(&ikhlas(), 2).unwrap();

        assert_eq!(data.english, None);
        assert!(data.transliteration.is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn test_translation_without_text_is_none() {
        let server = TestServer::spawn(vec![
            ("/surah/112", 200, surah_body()),
            (
                "/ayah/112:1/en.sahih",
                200,
                r#"{"code":404,"data":null}"#.to_string(),
            ),
        ]);
        let source = source_for(&server);

        let data = source.fetch_ayah(&ikhlas(), 1).unwrap();

        assert_eq!(data.english, None);
        assert_eq!(data.arabic, "قُلْ");
    }

    #[test]
    fn test_surah_payload_is_cached() {
        let server = TestServer::spawn(vec![("/surah/112", 200, surah_body())]);
        let source = source_for(&server);

        source.fetch_ayah(&ikhlas(), 1).unwrap();
        source.fetch_ayah(&ikhlas(), 2).unwrap();

        let surah_requests = server
            .requests()
            .iter()
            .filter(|r| r.starts_with("/surah/"))
            .count();
        assert_eq!(surah_requests, 1);
    }

    #[test]
    fn test_missing_verse() {
        let server = TestServer::spawn(vec![("/surah/112", 200, surah_body())]);
        let source = source_for(&server);

        assert_matches!(
            source.fetch_ayah(&ikhlas(), 3),
            Err(ContentError::MissingVerse {
                surah: 112,
                ayah: 3
            })
        );
        assert_matches!(
            source.fetch_ayah(&ikhlas(), 0),
            Err(ContentError::MissingVerse { .. })
        );
    }

    #[test]
    fn test_surah_api_failure_is_an_error() {
        let server = TestServer::spawn(vec![("/surah/112", 500, "boom".to_string())]);
        let source = source_for(&server);

        let err = source.fetch_ayah(&ikhlas(), 1).unwrap_err();

        assert_matches!(err, ContentError::Http { surah: 112, ayah: 1, .. });
        assert_eq!(server.requests().len(), 1);
    }

    #[test]
    fn test_malformed_payload() {
        let server = TestServer::spawn(vec![("/surah/112", 200, "{\"data\":[]}".to_string())]);
        let source = source_for(&server);

        assert_matches!(
            source.fetch_ayah(&ikhlas(), 1),
            Err(ContentError::Payload { surah: 112, .. })
        );
    }
}
