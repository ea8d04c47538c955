mod collective;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod group;
pub mod layout;
pub mod memory;
mod reduce;
pub mod types;
pub mod work;

pub use config::CclConfig;
pub use engine::{CollAttr, Engine, EngineFault, EngineRequest, LocalEngine, LocalFabric, RecvTarget};
pub use error::{CclError, ErrorKind, Result};
pub use gate::EngineGate;
pub use group::{HashStore, ProcessGroup, Store};
pub use memory::{Bf16, Buffer, Element, Layout, MemorySpace};
pub use types::{DataType, Rank, ReduceOp, WireType, to_wire_dtype};
pub use work::Work;
