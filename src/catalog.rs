//! The admin collections: typed records, their table schemas and where the
//! API serves them.

use clap::ValueEnum;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::TDError;
use crate::screen::{CollectionScreen, Loader, TableScreen};
use crate::source::ApiClient;
use crate::table::{ColumnDescriptor, Record, TabularView, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPackage {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub short_description: Option<String>,
    pub duration: Option<String>,
    #[serde(rename = "priceLKR")]
    pub price_lkr: Option<f64>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl Record for TourPackage {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "title" => Some(Value::Text(&self.title)),
            "slug" => Some(Value::Text(&self.slug)),
            "shortDescription" => self.short_description.as_deref().map(Value::Text),
            "duration" => self.duration.as_deref().map(Value::Text),
            "priceLKR" => self.price_lkr.map(Value::Number),
            "isFeatured" => Some(Value::Bool(self.is_featured)),
            _ => None,
        }
    }
}

pub fn tour_view(records: Vec<TourPackage>) -> TabularView<TourPackage> {
    let columns = vec![
        ColumnDescriptor::new("title", "Title").sortable(true),
        ColumnDescriptor::new("duration", "Duration").sortable(true),
        ColumnDescriptor::new("priceLKR", "Price (LKR)")
            .sortable(true)
            .render(|t: &TourPackage| t.price_lkr.map(format_lkr).unwrap_or_default()),
        ColumnDescriptor::new("includes", "Includes")
            .render(|t: &TourPackage| t.includes.join(", ")),
        ColumnDescriptor::new("isFeatured", "Status").render(|t: &TourPackage| {
            let label = if t.is_featured { "Featured" } else { "Standard" };
            label.to_string()
        }),
    ];
    TabularView::new(records, columns)
        .with_title("Tour packages")
        .with_search_keys(["title", "shortDescription"])
        .with_empty_message("No tour packages found. Create your first tour!")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faq {
    #[serde(alias = "_id")]
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    pub order: Option<f64>,
    #[serde(default)]
    pub is_active: bool,
}

impl Record for Faq {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "question" => Some(Value::Text(&self.question)),
            "answer" => Some(Value::Text(&self.answer)),
            "order" => self.order.map(Value::Number),
            "isActive" => Some(Value::Bool(self.is_active)),
            _ => None,
        }
    }
}

pub fn faq_view(records: Vec<Faq>) -> TabularView<Faq> {
    let columns = vec![
        ColumnDescriptor::new("order", "#").sortable(true),
        ColumnDescriptor::new("question", "Question").sortable(true),
        ColumnDescriptor::new("answer", "Answer"),
        ColumnDescriptor::new("isActive", "Status").render(|f: &Faq| {
            let label = if f.is_active { "Active" } else { "Inactive" };
            label.to_string()
        }),
    ];
    TabularView::new(records, columns)
        .with_title("FAQs")
        .with_search_keys(["question", "answer"])
        .with_empty_message("No FAQs found. Create your first FAQ!")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub country: Option<String>,
    pub stars: u8,
    #[serde(default)]
    pub content: String,
    pub date: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

impl Record for Review {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "name" => Some(Value::Text(&self.name)),
            "country" => self.country.as_deref().map(Value::Text),
            "stars" => Some(Value::Number(f64::from(self.stars))),
            "content" => Some(Value::Text(&self.content)),
            "date" => self.date.as_deref().map(Value::Text),
            "featured" => Some(Value::Bool(self.featured)),
            _ => None,
        }
    }
}

pub fn star_rating(stars: u8) -> String {
    let filled = usize::from(stars.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn review_view(records: Vec<Review>) -> TabularView<Review> {
    let columns = vec![
        ColumnDescriptor::new("name", "Reviewer")
            .sortable(true)
            .render(|r: &Review| match r.country.as_deref() {
                Some(country) if !country.is_empty() => format!("{} ({country})", r.name),
                _ => r.name.clone(),
            }),
        ColumnDescriptor::new("stars", "Rating")
            .sortable(true)
            .render(|r: &Review| star_rating(r.stars)),
        ColumnDescriptor::new("content", "Review"),
        ColumnDescriptor::new("date", "Date")
            .sortable(true)
            .render(|r: &Review| {
                r.date
                    .as_deref()
                    .map(|d| d.chars().take(10).collect())
                    .unwrap_or_else(|| "-".to_string())
            }),
        ColumnDescriptor::new("featured", "Status").render(|r: &Review| {
            let label = if r.featured { "Featured" } else { "Hidden" };
            label.to_string()
        }),
    ];
    TabularView::new(records, columns)
        .with_title("Reviews")
        .with_search_keys(["name", "content", "country"])
        .with_empty_message("No reviews found. Add your first review!")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub years_experience: f64,
    #[serde(default)]
    pub profile_photo: String,
}

impl Record for Guide {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "name" => Some(Value::Text(&self.name)),
            "role" => Some(Value::Text(&self.role)),
            "yearsExperience" => Some(Value::Number(self.years_experience)),
            "profilePhoto" => Some(Value::Text(&self.profile_photo)).filter(|_| !self.profile_photo.is_empty()),
            _ => None,
        }
    }
}

pub fn guide_view(records: Vec<Guide>) -> TabularView<Guide> {
    let columns = vec![
        ColumnDescriptor::new("name", "Guide").sortable(true),
        ColumnDescriptor::new("languages", "Languages").render(|g: &Guide| g.languages.join(", ")),
        ColumnDescriptor::new("yearsExperience", "Experience")
            .sortable(true)
            .render(|g: &Guide| format!("{} years", g.years_experience)),
        ColumnDescriptor::new("role", "Role"),
    ];
    TabularView::new(records, columns)
        .with_title("Guides")
        .with_search_keys(["name", "role"])
        .with_empty_message("No guides found. Add your first guide!")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryCategory {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub order: Option<f64>,
    #[serde(default)]
    pub image_count: u64,
}

impl Record for GalleryCategory {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "name" => Some(Value::Text(&self.name)),
            "slug" => Some(Value::Text(&self.slug)),
            "order" => self.order.map(Value::Number),
            "imageCount" => Some(Value::Number(self.image_count as f64)),
            _ => None,
        }
    }
}

pub fn category_view(records: Vec<GalleryCategory>) -> TabularView<GalleryCategory> {
    let columns = vec![
        ColumnDescriptor::new("order", "#").sortable(true),
        ColumnDescriptor::new("name", "Name").sortable(true),
        ColumnDescriptor::new("slug", "Slug").render(|c: &GalleryCategory| format!("/{}", c.slug)),
        ColumnDescriptor::new("imageCount", "Images").render(|c: &GalleryCategory| match c.image_count {
            1 => "1 image".to_string(),
            n => format!("{n} images"),
        }),
    ];
    TabularView::new(records, columns)
        .with_title("Gallery categories")
        .with_search_keys(["name", "slug"])
        .with_empty_message("No categories found. Create your first category!")
}

/// `categoryId` arrives populated or as a bare id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Populated {
        slug: Option<String>,
        name: Option<String>,
    },
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    #[serde(alias = "_id")]
    pub id: String,
    pub image_url: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    #[serde(rename = "categoryId")]
    pub category: Option<CategoryRef>,
}

impl GalleryImage {
    pub fn category_name(&self) -> Option<&str> {
        match self.category.as_ref()? {
            CategoryRef::Populated { name, .. } => name.as_deref(),
            CategoryRef::Id(_) => None,
        }
    }
}

impl Record for GalleryImage {
    fn id(&self) -> &str {
        &self.id
    }

    fn value(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "imageUrl" => Some(Value::Text(&self.image_url)),
            "title" => self.title.as_deref().filter(|s| !s.is_empty()).map(Value::Text),
            "caption" => self.caption.as_deref().filter(|s| !s.is_empty()).map(Value::Text),
            "categoryName" => self.category_name().map(Value::Text),
            _ => None,
        }
    }
}

pub fn image_view(records: Vec<GalleryImage>) -> TabularView<GalleryImage> {
    let columns = vec![
        ColumnDescriptor::new("title", "Title").sortable(true),
        ColumnDescriptor::new("categoryName", "Category").sortable(true),
        ColumnDescriptor::new("caption", "Caption"),
        ColumnDescriptor::new("imageUrl", "Url"),
    ];
    TabularView::new(records, columns)
        .with_title("Gallery images")
        .with_search_keys(["title", "caption", "categoryName"])
        .with_empty_message("No images found. Upload your first image!")
}

fn format_lkr(amount: f64) -> String {
    let digits = format!("{:.0}", amount.abs());
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Tours,
    Faqs,
    Reviews,
    Guides,
    GalleryCategories,
    GalleryImages,
}

impl Collection {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Collection::Tours => "/tour-packages/admin/all",
            Collection::Faqs => "/api/faqs/admin",
            Collection::Reviews => "/api/reviews/admin",
            Collection::Guides => "/guides/admin",
            Collection::GalleryCategories => "/api/gallery-categories/admin",
            Collection::GalleryImages => "/api/gallery-images",
        }
    }

    /// Key holding the list when the endpoint wraps it in an object.
    pub fn envelope(&self) -> &'static str {
        match self {
            Collection::Tours => "tours",
            Collection::Faqs => "faqs",
            Collection::Reviews => "reviews",
            Collection::Guides => "guides",
            Collection::GalleryCategories => "categories",
            Collection::GalleryImages => "images",
        }
    }

    pub fn open(&self, api: &ApiClient) -> Result<Box<dyn TableScreen>, TDError> {
        match self {
            Collection::Tours => self.load(api, tour_view(Vec::new())),
            Collection::Faqs => self.load(api, faq_view(Vec::new())),
            Collection::Reviews => self.load(api, review_view(Vec::new())),
            Collection::Guides => self.load(api, guide_view(Vec::new())),
            Collection::GalleryCategories => self.load(api, category_view(Vec::new())),
            Collection::GalleryImages => self.load(api, image_view(Vec::new())),
        }
    }

    fn load<R>(&self, api: &ApiClient, view: TabularView<R>) -> Result<Box<dyn TableScreen>, TDError>
    where
        R: Record + DeserializeOwned + 'static,
    {
        let api = api.clone();
        let (path, envelope) = (self.endpoint(), self.envelope());
        let loader: Loader<R> = Box::new(move || api.fetch_list(path, envelope));
        Ok(Box::new(CollectionScreen::load(view, loader)?))
    }
}
