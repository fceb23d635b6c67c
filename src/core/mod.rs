pub mod call;
pub mod codec;
pub mod persona;
pub mod realtime;

pub use call::{BridgeAction, BridgeOptions, CallBridge, CallSession, LifecycleState};
pub use persona::{PersonaConfig, PersonaError, PersonaStore, StaticPersonaStore};
pub use realtime::{
    ClientEvent, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeResult, ServerEvent,
    UpstreamAudioFormat,
};
