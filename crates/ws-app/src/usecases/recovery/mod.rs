mod resolver;

pub use resolver::SessionRecoveryResolver;
