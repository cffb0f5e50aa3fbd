pub mod audio;
pub mod realtime;
pub mod session;

// Re-export commonly used types for convenience
pub use audio::{AudioDevices, CpalDevices, LevelMeter};

pub use realtime::{
    BoxedProviderAdapter, GeminiLiveAdapter, OpenAIRealtimeAdapter, ProviderAdapter,
    ProviderConfig, ProviderEvent, RealtimeError, RealtimeProvider, RealtimeResult,
    create_provider_adapter, get_supported_realtime_providers,
};

pub use session::{SessionConfig, SessionEnd, TranscriptAccumulator, VoiceSession, VoiceState};
