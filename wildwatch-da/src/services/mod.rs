//! Services for wildwatch-da
//!
//! Classifier and gateway clients, the alert dispatcher, the detection
//! controller and the carousel model.

pub mod alert_dispatcher;
pub mod carousel;
pub mod classifier_client;
pub mod detection_controller;
pub mod messaging_gateway;

pub use alert_dispatcher::{AlertDispatcher, DispatchError};
pub use carousel::{spawn_autoplay, Carousel, CarouselError, CarouselView, Navigation, Slide};
pub use classifier_client::{AudioSample, ClassificationError, Classifier, HttpClassifierClient};
pub use detection_controller::{DetectionController, DetectionError};
pub use messaging_gateway::{
    Channel, DeliveryError, LogGateway, MessagingGateway, TwilioConfig, TwilioGateway,
};
