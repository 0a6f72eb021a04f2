pub mod bible;
pub mod cache;
pub mod domain;
pub mod meditation;
pub mod ports;
pub mod resolver;

pub use domain::{
    AuthSession, ChapterPassage, HistoryEntry, PassageVerse, PrayerRequest, Reflection,
    Suggestion, User, UserCredentials, Verse,
};
pub use ports::{
    AudioSink, CacheStore, DatabaseService, PortError, PortResult, ReflectionService,
    ScriptureService,
};
pub use resolver::{ContentError, DailyContentResolver, DailyVerse, VerseSource};
