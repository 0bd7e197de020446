mod static_;
pub use static_::StaticCredentialProvider;

mod env;
pub use env::EnvCredentialProvider;

mod chain;
pub use chain::ProvideCredentialChain;

mod default;
pub use default::DefaultCredentialProvider;
