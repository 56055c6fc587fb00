/*!
# Oiotung DevKit - Doublures de test pour l'agent

Bibliothèque facilitant les tests de l'agent Oiotung avec:
- Serveur de statut scripté parlant le protocole binaire
- Construction de trames de réponse (valides ou corrompues)
- Harness combinant serveur de statut et webhook simulé
*/

pub mod status_stub;
pub mod frame_builder;
pub mod test_utils;

pub use status_stub::{Reply, StubStatusServer};
pub use frame_builder::FrameBuilder;
pub use test_utils::TestHarness;
