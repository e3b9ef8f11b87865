pub mod voice_state;
