/*!
Construction de trames de réponse du protocole de statut

Produit les octets qu'un serveur de statut renverrait après un ping, avec
possibilité de corrompre l'en-tête pour tester les chemins d'erreur.
*/

pub const MAGIC: u32 = 0xEBAC_ABEE;
pub const VERSION: u32 = 3;

/// Builder de trame serveur -> client
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    magic: u32,
    version: u32,
    online: u16,
    max: u16,
    servers: Vec<(Vec<u8>, [u16; 4])>,
    counted: bool,
}

impl FrameBuilder {
    pub fn new(online: u16, max: u16) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            online,
            max,
            servers: Vec::new(),
            counted: true,
        }
    }

    /// Octets attendus pour un ping client
    pub fn ping() -> [u8; 8] {
        let mut ping = [0u8; 8];
        ping[..4].copy_from_slice(&MAGIC.to_be_bytes());
        ping[4..].copy_from_slice(&VERSION.to_be_bytes());
        ping
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Ajoute un sous-serveur (offline queue, deprecated queue, joueurs, capacité)
    pub fn server(self, name: &str, offline_queue: u16, deprecated_queue: u16, players: u16, cap: u16) -> Self {
        self.raw_server(name.as_bytes(), [offline_queue, deprecated_queue, players, cap])
    }

    /// Ajoute un sous-serveur avec un nom brut (UTF-8 invalide possible)
    pub fn raw_server(mut self, name: &[u8], counters: [u16; 4]) -> Self {
        self.servers.push((name.to_vec(), counters));
        self
    }

    /// Omet l'octet de comptage (anciens pairs à liste implicite)
    pub fn implicit_count(mut self) -> Self {
        self.counted = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.online.to_be_bytes());
        out.extend_from_slice(&self.max.to_be_bytes());

        if self.counted {
            out.push(self.servers.len() as u8);
        }

        for (name, counters) in &self.servers {
            out.push(name.len() as u8);
            out.extend_from_slice(name);
            for counter in counters {
                out.extend_from_slice(&counter.to_be_bytes());
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let frame = FrameBuilder::new(0x0102, 0x0304).build();
        assert_eq!(
            frame,
            vec![0xEB, 0xAC, 0xAB, 0xEE, 0, 0, 0, 3, 0x01, 0x02, 0x03, 0x04, 0]
        );
    }

    #[test]
    fn test_server_record_layout() {
        let frame = FrameBuilder::new(0, 0).server("ab", 1, 2, 3, 4).implicit_count().build();
        assert_eq!(&frame[12..], &[2, b'a', b'b', 0, 1, 0, 2, 0, 3, 0, 4]);
    }

    #[test]
    fn test_corrupted_header() {
        let frame = FrameBuilder::new(0, 0).magic(1).version(99).build();
        assert_eq!(&frame[..8], &[0, 0, 0, 1, 0, 0, 0, 99]);
    }

    #[test]
    fn test_ping_bytes() {
        assert_eq!(FrameBuilder::ping(), [0xEB, 0xAC, 0xAB, 0xEE, 0, 0, 0, 3]);
    }
}
