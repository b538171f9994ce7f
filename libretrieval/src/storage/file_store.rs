use crate::deal::{ClientDealState, DealId};
use crate::storage::traits::DealStore;
use ron::ser::PrettyConfig;
use std::fs;
use std::path::PathBuf;

/// A file-based store for retrieval deal records.
///
/// Each deal is saved in a file named after its identifier, e.g. `deal-7.ron`.
/// A snapshot is the whole record; recovery spawns the machine on the loaded
/// record and it re-enters its current state.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a new file store with the given path.
    ///
    /// # Arguments
    /// * `path` - The path to the directory where the deal files will be stored.
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(Self { path })
    }

    /// Returns the path to the directory where the deal files are stored.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl DealStore for FileStore {
    fn write_deal(&mut self, deal: &ClientDealState) -> Result<(), anyhow::Error> {
        let file_path = self.path.join(format!("{}.ron", deal.id()));
        let config = PrettyConfig::new().compact_arrays(true).compact_maps(true);
        let val = ron::ser::to_string_pretty(&deal, config)?;
        fs::write(&file_path, &val)?;
        Ok(())
    }

    fn load_deal(&self, id: DealId) -> Result<ClientDealState, anyhow::Error> {
        let file_path = self.path.join(format!("{id}.ron"));
        let val = fs::read_to_string(&file_path)?;
        let deal: ClientDealState = ron::de::from_str(&val)?;
        Ok(deal)
    }
}
