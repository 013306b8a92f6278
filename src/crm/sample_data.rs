//! Random India-based customer records for seeding an empty CRM database.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::manager::CustomerManager;
use super::model::{ActiveStatus, NewCustomer};
use crate::core::errors::ApiError;

const FIRST_NAMES: [&str; 25] = [
    "Aarav", "Vivaan", "Aditya", "Arjun", "Sai", "Aryan", "Reyansh", "Ayaan", "Krishna",
    "Ishaan", "Shaurya", "Atharv", "Advait", "Pranav", "Aadhya", "Ananya", "Diya", "Saanvi",
    "Pari", "Navya", "Ishita", "Kavya", "Aarohi", "Prisha", "Kiara",
];

const LAST_NAMES: [&str; 24] = [
    "Sharma", "Verma", "Patel", "Kumar", "Singh", "Gupta", "Reddy", "Nair", "Iyer", "Rao",
    "Mehta", "Shah", "Desai", "Joshi", "Agarwal", "Menon", "Pillai", "Chopra", "Malhotra",
    "Khanna", "Bose", "Das", "Mukherjee", "Chatterjee",
];

/// (city, state, localities)
const CITIES: [(&str, &str, [&str; 5]); 8] = [
    ("Mumbai", "Maharashtra", ["Andheri", "Bandra", "Powai", "Juhu", "Colaba"]),
    ("Delhi", "Delhi", ["Connaught Place", "Karol Bagh", "Dwarka", "Rohini", "Saket"]),
    ("Bangalore", "Karnataka", ["Koramangala", "Indiranagar", "Whitefield", "HSR Layout", "Jayanagar"]),
    ("Chennai", "Tamil Nadu", ["T Nagar", "Anna Nagar", "Velachery", "Adyar", "Mylapore"]),
    ("Hyderabad", "Telangana", ["Banjara Hills", "Jubilee Hills", "Gachibowli", "Hitech City", "Madhapur"]),
    ("Pune", "Maharashtra", ["Koregaon Park", "Hinjewadi", "Kothrud", "Viman Nagar", "Aundh"]),
    ("Kolkata", "West Bengal", ["Salt Lake", "Park Street", "Ballygunge", "Alipore", "New Town"]),
    ("Ahmedabad", "Gujarat", ["Vastrapur", "Satellite", "Maninagar", "Navrangpura", "Bodakdev"]),
];

const STREETS: [&str; 10] = [
    "MG Road", "Gandhi Street", "Nehru Nagar", "Park Avenue", "Main Road", "Station Road",
    "Church Street", "Brigade Road", "Ring Road", "Link Road",
];

const EMAIL_DOMAINS: [&str; 5] = [
    "gmail.com", "yahoo.in", "outlook.com", "rediffmail.com", "hotmail.com",
];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

pub fn generate_address<R: Rng + ?Sized>(rng: &mut R) -> String {
    let (city, state, areas) = CITIES[rng.random_range(0..CITIES.len())];
    let area = pick(rng, &areas);
    let street = pick(rng, &STREETS);
    let building_no = rng.random_range(1..=999);
    let pin_code = rng.random_range(100_000..=999_999);
    format!("{}, {}, {}, {}, {} - {}", building_no, street, area, city, state, pin_code)
}

/// Ten-digit mobile number starting with 6-9, prefixed with `+91`.
pub fn generate_phone<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut phone = format!("+91{}", rng.random_range(6..=9));
    for _ in 0..9 {
        phone.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    phone
}

pub fn generate_email<R: Rng + ?Sized>(rng: &mut R, name: &str) -> String {
    format!(
        "{}{}@{}",
        name.to_lowercase().replace(' ', "."),
        rng.random_range(1..=999),
        pick(rng, &EMAIL_DOMAINS)
    )
}

pub fn generate_customer<R: Rng + ?Sized>(rng: &mut R) -> NewCustomer {
    let name = format!("{} {}", pick(rng, &FIRST_NAMES), pick(rng, &LAST_NAMES));
    let credit = (rng.random_range(0.0..100_000.0f64) * 100.0).round() / 100.0;
    let active_status = if rng.random_bool(0.75) {
        ActiveStatus::Active
    } else {
        ActiveStatus::Inactive
    };

    NewCustomer {
        address: generate_address(rng),
        email: generate_email(rng, &name),
        phone: generate_phone(rng),
        name,
        credit,
        active_status,
    }
}

/// Inserts up to `count` random customers, giving up after `3 * count`
/// attempts so repeated email collisions cannot loop forever. Returns the
/// number actually created.
pub async fn seed_customers(manager: &CustomerManager, count: usize) -> Result<usize, ApiError> {
    let max_attempts = count * 3;
    let mut created = 0;
    let mut attempts = 0;

    while created < count && attempts < max_attempts {
        attempts += 1;
        // ThreadRng is !Send; keep it out of the await below.
        let customer = generate_customer(&mut rand::rng());
        if manager.create_customer(&customer).await?.is_some() {
            created += 1;
            tracing::debug!("Seeded customer {}: {} ({})", created, customer.name, customer.email);
        }
    }

    if created < count {
        tracing::warn!(
            "Seeded {} of {} customers after {} attempts",
            created,
            count,
            attempts
        );
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::manager::tests::test_manager;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_fields_follow_formats() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let customer = generate_customer(&mut rng);

            assert_eq!(customer.phone.len(), 13);
            assert!(customer.phone.starts_with("+91"));
            assert!(matches!(customer.phone.as_bytes()[3], b'6'..=b'9'));

            let local = customer.email.split('@').next().unwrap();
            let expected_prefix = customer.name.to_lowercase().replace(' ', ".");
            assert!(local.starts_with(&expected_prefix));
            assert!(EMAIL_DOMAINS.contains(&customer.email.split('@').nth(1).unwrap()));

            assert!((0.0..100_000.0).contains(&customer.credit));
            assert_eq!((customer.credit * 100.0).round() / 100.0, customer.credit);

            let pin = customer.address.rsplit(" - ").next().unwrap();
            assert_eq!(pin.len(), 6);
            assert_eq!(customer.address.split(", ").count(), 5);
        }
    }

    #[tokio::test]
    async fn seeding_fills_empty_table() {
        let (_dir, manager) = test_manager().await;
        let created = seed_customers(&manager, 10).await.unwrap();
        assert_eq!(created as i64, manager.get_customer_count().await.unwrap());
        assert!(created >= 8);
    }
}
