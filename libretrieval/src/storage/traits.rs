use crate::deal::{ClientDealState, DealId};

pub trait DealStore {
    fn write_deal(&mut self, deal: &ClientDealState) -> Result<(), anyhow::Error>;
    fn load_deal(&self, id: DealId) -> Result<ClientDealState, anyhow::Error>;
}
