pub mod adapter;
pub mod driver;
pub mod frame;
pub mod reader;
pub mod session;
pub mod synthetic;

pub use adapter::{ColorImage, DepthImage};
pub use driver::{CameraDriver, DriverContext, DriverError, StreamKind, VideoMode};
pub use frame::{PixelFormat, RawFrame};
pub use reader::FrameReader;
pub use session::{DeviceSession, RegistrationState};
pub use synthetic::SyntheticCamera;
