//! Registro de conexiones WebSocket
//!
//! Cada conexión viva aporta el lado de escritura de un canal mpsc;
//! la task de escritura del socket drena el otro extremo. Un envío
//! fallido (receptor caído) expulsa la conexión del registro.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::dto::ws::WsFrame;

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, mpsc::UnboundedSender<WsFrame>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra la conexión de una entidad. Una conexión previa queda
    /// desplazada: su canal se cierra al soltar el sender.
    pub async fn register(&self, entity_id: Uuid, sender: mpsc::UnboundedSender<WsFrame>) {
        self.inner.write().await.insert(entity_id, sender);
    }

    pub async fn unregister(&self, entity_id: Uuid) {
        self.inner.write().await.remove(&entity_id);
    }

    /// Baja condicionada: solo remueve si la entrada sigue siendo la
    /// de este canal. Una conexión desplazada por otra más nueva no
    /// debe llevarse la entrada de la nueva al cerrarse.
    pub async fn unregister_if(&self, entity_id: Uuid, sender: &mpsc::UnboundedSender<WsFrame>) {
        let mut connections = self.inner.write().await;
        if let Some(existing) = connections.get(&entity_id) {
            if existing.same_channel(sender) {
                connections.remove(&entity_id);
            }
        }
    }

    pub async fn is_connected(&self, entity_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&entity_id)
    }

    /// Envía un frame a la entidad. Devuelve false si no está
    /// conectada (no es un error: simplemente está offline) o si la
    /// conexión resultó muerta, en cuyo caso se auto-remueve.
    pub async fn send(&self, entity_id: Uuid, frame: WsFrame) -> bool {
        let sender = { self.inner.read().await.get(&entity_id).cloned() };

        let Some(sender) = sender else {
            debug!("entidad {} no conectada; frame descartado", entity_id);
            return false;
        };

        if sender.send(frame).is_err() {
            self.inner.write().await.remove(&entity_id);
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> WsFrame {
        WsFrame::Error {
            message: "ping".to_string(),
        }
    }

    #[tokio::test]
    async fn send_to_absent_entity_is_a_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send(Uuid::new_v4(), frame()).await);
    }

    #[tokio::test]
    async fn send_reaches_registered_entity() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register(id, tx).await;
        assert!(registry.send(id, frame()).await);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn dead_connection_is_evicted_on_first_failed_send() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        registry.register(id, tx).await;
        drop(rx);

        assert!(!registry.send(id, frame()).await);
        assert!(!registry.is_connected(id).await);
    }
}
